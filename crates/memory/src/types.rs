use serde::{Deserialize, Serialize};

/// Kind of the assistant's most recent reply, consumed by the conversation
/// flow when it builds context references for follow-up questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    Shell,
    Program,
    Conversation,
    #[default]
    None,
}

/// Mutable interaction state for one session. Created lazily on first
/// contact, lives for the process lifetime.
///
/// Invariant: `awaiting_debug_response` is only true while `last_error_log`
/// holds the output of the failed run the user is being asked about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub last_command_run: Option<String>,
    pub last_error_log: Option<String>,
    pub full_error_output: Vec<String>,
    pub awaiting_debug_response: bool,
    pub last_generated_code: Option<String>,
    pub last_response_kind: ResponseKind,
}

impl SessionContext {
    /// Bookkeeping for a new observed command: record it and drop every
    /// trace of the previous run. Called exactly once per invocation,
    /// before the first output line is read.
    pub fn begin_command(&mut self, command: &str) {
        self.last_command_run = Some(command.to_string());
        self.last_error_log = None;
        self.full_error_output.clear();
    }

    /// Leaves the recovery conversation, regardless of whether a fix was
    /// applied or declined.
    pub fn reset_recovery(&mut self) {
        self.last_error_log = None;
        self.last_command_run = None;
        self.awaiting_debug_response = false;
        self.full_error_output.clear();
    }
}
