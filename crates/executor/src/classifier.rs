use shellsage_policy::InterpreterInvocation;

/// Keywords whose presence in an output line marks a failed interpreter run.
pub const DEFAULT_SIGNATURES: &[&str] = &[
    "error",
    "exception",
    "not found",
    "failed",
    "permission denied",
    "command not found",
    "no such file or directory",
    "segmentation fault",
    "fatal",
];

/// Keyword classifier for shell output. Classification is only armed for
/// interpreter-invocation shaped commands: a plain listing whose output
/// happens to contain the word "error" must not trigger remediation. The
/// signature list is injectable so a richer classifier can replace it
/// without touching the observer.
pub struct FailureClassifier {
    signatures: Vec<String>,
}

impl FailureClassifier {
    pub fn new() -> Self {
        Self::with_signatures(DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_signatures(signatures: Vec<String>) -> Self {
        let signatures = signatures.into_iter().map(|s| s.to_lowercase()).collect();
        Self { signatures }
    }

    /// Whether output of this command should be classified at all.
    pub fn applies_to(&self, command: &str) -> bool {
        InterpreterInvocation::parse(command).is_some()
    }

    /// Case-insensitive signature match against one output line.
    pub fn is_failure_line(&self, line: &str) -> bool {
        let lowered = line.to_lowercase();
        self.signatures.iter().any(|sig| lowered.contains(sig))
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_lines_match_case_insensitively() {
        let classifier = FailureClassifier::new();
        assert!(classifier.is_failure_line("Traceback ... ZeroDivisionError"));
        assert!(classifier.is_failure_line("PERMISSION DENIED"));
        assert!(classifier.is_failure_line("bash: foo: command not found"));
        assert!(classifier.is_failure_line("Segmentation fault (core dumped)"));
    }

    #[test]
    fn test_ordinary_lines_do_not_match() {
        let classifier = FailureClassifier::new();
        assert!(!classifier.is_failure_line("all tests passed"));
        assert!(!classifier.is_failure_line("processing item 42"));
    }

    #[test]
    fn test_applies_only_to_interpreter_invocations() {
        let classifier = FailureClassifier::new();
        assert!(classifier.applies_to("python broken.py"));
        assert!(classifier.applies_to("sh deploy.sh --env prod"));
        assert!(!classifier.applies_to("ls -la"));
        assert!(!classifier.applies_to("echo error"));
    }

    #[test]
    fn test_custom_signature_list() {
        let classifier = FailureClassifier::with_signatures(vec!["PANIC".to_string()]);
        assert!(classifier.is_failure_line("thread panicked"));
        assert!(!classifier.is_failure_line("error: this list does not know about errors"));
    }
}
