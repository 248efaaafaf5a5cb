use regex::Regex;

/// A command of the form "interpreter + script file": `python broken.py`,
/// `sh deploy.sh`, `./tool.py`. Output classification and fix-target
/// recovery both key off this shape; arbitrary shell invocations (a listing
/// command that happens to print the word "error") never qualify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterInvocation {
    pub interpreter: String,
    pub script: String,
}

const NAMED_INTERPRETER: &str =
    r"(?i)^\s*(python3|python|bash|sh|node)\s+(\S+\.(?:py|sh|js|rb|pl|php))(?:\s|$)";
const DIRECT_SCRIPT: &str = r"(?i)^\s*\./(\S+\.(?:py|sh|js|rb|pl|php))(?:\s|$)";

impl InterpreterInvocation {
    /// Parses the interpreter + script shape out of a command line, if present.
    pub fn parse(command: &str) -> Option<Self> {
        let named = Regex::new(NAMED_INTERPRETER).expect("interpreter pattern is a valid regex");
        if let Some(caps) = named.captures(command) {
            return Some(Self {
                interpreter: caps[1].to_lowercase(),
                script: caps[2].to_string(),
            });
        }

        let direct = Regex::new(DIRECT_SCRIPT).expect("script pattern is a valid regex");
        if let Some(caps) = direct.captures(command) {
            return Some(Self {
                interpreter: "./".to_string(),
                script: caps[1].to_string(),
            });
        }

        None
    }

    /// The command line to suggest after a repaired script has been written.
    pub fn rerun_hint(&self) -> String {
        if self.interpreter == "./" {
            format!("./{}", self.script)
        } else {
            format!("{} {}", self.interpreter, self.script)
        }
    }
}
