use regex::Regex;

/// Deny rules for destructive shell commands. Each rule requires the keyword
/// plus its adjacent token (flag or root-level target), so a benign command
/// that merely mentions a keyword does not match.
const DENY_PATTERNS: &[&str] = &[
    // recursive force-delete, any target
    r"\brm\b\s+-(?:rf|fr)\b",
    // delete or move the filesystem root itself
    r"\brm\b\s+/(?:\s|$)",
    r"\bmv\b\s+/(?:\s|$)",
    // ownership handover to the privileged user
    r"\bchown\b\s+root\b",
    // numeric mode change applied to a root path
    r"\bchmod\b\s+[0-7]{3,4}\s+/",
    // removing packages out from under the runtime
    r"\bpkg\s+uninstall\b",
];

pub struct CommandFilter {
    rules: Vec<Regex>,
}

impl CommandFilter {
    pub fn new() -> Self {
        let rules = DENY_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("deny pattern is a valid regex"))
            .collect();
        Self { rules }
    }

    /// Returns true if the command matches any deny rule. Matching is
    /// case-insensitive and must run before every spawn, including commands
    /// produced by natural-language conversion.
    pub fn is_dangerous(&self, command: &str) -> bool {
        let lowered = command.to_lowercase();
        for rule in &self.rules {
            if rule.is_match(&lowered) {
                tracing::warn!(command, rule = rule.as_str(), "dangerous command blocked");
                return true;
            }
        }
        false
    }
}

impl Default for CommandFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_force_delete_blocked() {
        let filter = CommandFilter::new();
        assert!(filter.is_dangerous("rm -rf /data"));
        assert!(filter.is_dangerous("rm -fr ./build"));
        assert!(filter.is_dangerous("RM -RF /tmp/x"));
    }

    #[test]
    fn test_plain_listing_allowed() {
        let filter = CommandFilter::new();
        assert!(!filter.is_dangerous("ls -la /data"));
        assert!(!filter.is_dangerous("cat error.log"));
    }

    #[test]
    fn test_root_ownership_and_mode_blocked() {
        let filter = CommandFilter::new();
        assert!(filter.is_dangerous("chown root /etc/passwd"));
        assert!(filter.is_dangerous("chmod 000 /"));
        assert!(filter.is_dangerous("chmod 777 /etc"));
    }

    #[test]
    fn test_package_uninstall_blocked() {
        let filter = CommandFilter::new();
        assert!(filter.is_dangerous("pkg uninstall neofetch"));
    }

    #[test]
    fn test_no_substring_false_positive() {
        let filter = CommandFilter::new();
        assert!(!filter.is_dangerous("mkdir rm-rf-notes"));
        assert!(!filter.is_dangerous("grep chown README.md"));
        assert!(!filter.is_dangerous("echo pkg uninstalled cleanly"));
        assert!(!filter.is_dangerous("touch rm-rf"));
    }

    #[test]
    fn test_root_delete_requires_root_target() {
        let filter = CommandFilter::new();
        assert!(filter.is_dangerous("rm /"));
        assert!(filter.is_dangerous("mv / /backup"));
        assert!(!filter.is_dangerous("rm /tmp/scratch.txt"));
    }
}
