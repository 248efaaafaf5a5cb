/// Lines accumulated before a delivery flush. Bounds message frequency
/// without reordering: output is delivered in the exact order produced.
pub const BATCH_FLUSH_LINES: usize = 10;

pub struct DeliveryBatcher {
    lines: Vec<String>,
    threshold: usize,
}

impl DeliveryBatcher {
    pub fn new() -> Self {
        Self::with_threshold(BATCH_FLUSH_LINES)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            lines: Vec::new(),
            threshold: threshold.max(1),
        }
    }

    /// Queues a line; returns a formatted batch once the threshold is
    /// reached.
    pub fn push(&mut self, line: &str) -> Option<String> {
        self.lines.push(line.to_string());
        if self.lines.len() >= self.threshold {
            self.flush()
        } else {
            None
        }
    }

    /// Drains whatever is queued, if anything.
    pub fn flush(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let batch = format!("```\n{}\n```", self.lines.join("\n"));
        self.lines.clear();
        Some(batch)
    }

    pub fn pending(&self) -> usize {
        self.lines.len()
    }
}

impl Default for DeliveryBatcher {
    fn default() -> Self {
        Self::new()
    }
}
