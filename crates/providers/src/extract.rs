use regex::Regex;

/// Pulls the code out of a model reply. Prefers a fenced `python` block,
/// then any fenced block, then a line heuristic that keeps code-shaped lines
/// and drops surrounding prose.
pub fn extract_code(response: &str) -> String {
    let python_fence =
        Regex::new(r"(?s)```python\n(.*?)```").expect("fence pattern is a valid regex");
    if let Some(caps) = python_fence.captures(response) {
        return caps[1].trim().to_string();
    }

    let any_fence =
        Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").expect("fence pattern is a valid regex");
    if let Some(caps) = any_fence.captures(response) {
        return caps[1].trim().to_string();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut in_code = false;
    for line in response.trim().lines() {
        let stripped = line.trim();
        if looks_like_code(stripped) {
            kept.push(line);
            in_code = true;
        } else if in_code && stripped.is_empty() {
            kept.push(line);
        } else if in_code && !stripped.is_empty() {
            // Prose after the code body: stop rather than mixing it in.
            break;
        }
    }

    kept.join("\n").trim().to_string()
}

fn looks_like_code(line: &str) -> bool {
    if line.starts_with('#') || line.starts_with("import ") || line.starts_with("from ") {
        return true;
    }
    const KEYWORDS: &[&str] = &["def ", "class ", "if ", "for ", "while ", "try", "with "];
    if KEYWORDS.iter().any(|kw| line.starts_with(kw)) {
        return true;
    }
    line.contains('=') || line.contains('(') || line.contains(')')
}
