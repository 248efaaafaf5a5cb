use crate::extract::extract_code;
use crate::traits::{CompletionOptions, LanguageModel, Message, ProviderError};
use std::sync::Arc;

/// What the user wants from a message: run something, build something, or
/// just talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Shell,
    Program,
    Conversation,
}

/// Answer a converter model gives when an instruction has no sensible shell
/// equivalent.
const NOT_CONVERTIBLE: &str = "NOT_CONVERTIBLE";

const INTENT_PROMPT: &str = "You are an intent detector. Identify whether the user's message means:\n\
- \"shell\": the user wants to run a system command or perform a file operation (e.g. \"delete the file\", \"show the directory\", \"run\", \"install\", \"compress\").\n\
- \"program\": the user wants program code written or repaired (e.g. \"write a python function\", \"fix this error\", \"write a program\").\n\
- \"conversation\": any other question or interaction.\n\n\
Reply with exactly one word from the categories above. No explanation.";

const CONVERTER_PROMPT: &str = "You translate natural language into shell commands. Convert the following instruction into the single most relevant Linux shell command line. Reply with the command only, no explanation. If the instruction is unclear or cannot be turned into a shell command, reply with 'NOT_CONVERTIBLE'.";

const CODER_PROMPT: &str = "You are a coding assistant. Produce *only* complete Python code. If the user must fill something in, mark it with a clear comment inside the code. Include every required import. Do NOT add explanations or text outside the Markdown code block. Format your reply as a Markdown Python code block.";

const REPAIR_PROMPT: &str = "You are an expert at repairing Python code. Based on the given error log and the conversation so far, reply with *only* the complete corrected (or new) Python code. Include every required import. Do NOT add explanations or text outside the Markdown code block. Format your reply as a Markdown Python code block.";

const FILENAME_PROMPT: &str = "You are a filename generator. Given the following code description, reply with one short, relevant, descriptive Python file name: no spaces, use underscores, all lowercase, without the .py extension. Example: 'factorial_function' or 'snake_game'. Reply with the name only.";

/// Per-task model routing. Every helper builds its own prompt the way the
/// reference conversation flow does and degrades to a safe default where the
/// flow must not stall on a provider failure.
pub struct AssistantModels {
    pub intent: Arc<dyn LanguageModel>,
    pub converter: Arc<dyn LanguageModel>,
    pub coder: Arc<dyn LanguageModel>,
    pub advisor: Arc<dyn LanguageModel>,
    pub chat: Arc<dyn LanguageModel>,
}

impl AssistantModels {
    /// Classifies a user message. Unknown or failed classifications fall
    /// back to `Conversation` so the user always gets an answer.
    pub async fn detect_intent(&self, text: &str) -> Intent {
        let messages = [
            Message::system(INTENT_PROMPT),
            Message::user(format!("Detect the intent of: '{}'", text)),
        ];
        let options = CompletionOptions {
            max_tokens: 10,
            temperature: 0.0,
        };

        match self.intent.complete(&messages, options).await {
            Ok(reply) => match reply.trim().to_lowercase().as_str() {
                "shell" => Intent::Shell,
                "program" => Intent::Program,
                "conversation" => Intent::Conversation,
                other => {
                    tracing::warn!(reply = other, "unrecognized intent, defaulting to conversation");
                    Intent::Conversation
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "intent detection failed, defaulting to conversation");
                Intent::Conversation
            }
        }
    }

    /// Natural language to a single shell command. `Ok(None)` means the
    /// model reported the instruction as not convertible.
    pub async fn to_shell_command(
        &self,
        history: &[Message],
        text: &str,
    ) -> Result<Option<String>, ProviderError> {
        let mut messages: Vec<Message> = history.to_vec();
        messages.push(Message::system(CONVERTER_PROMPT));
        messages.push(Message::user(format!(
            "Convert this to a shell command: {}",
            text
        )));

        let options = CompletionOptions {
            max_tokens: 128,
            temperature: 0.3,
        };
        let reply = self.converter.complete(&messages, options).await?;
        let command = reply.trim().to_string();

        if command == NOT_CONVERTIBLE || command.is_empty() {
            return Ok(None);
        }
        Ok(Some(command))
    }

    /// Remediation advice for a captured error log.
    pub async fn suggest_repair(
        &self,
        history: &[Message],
        error_log: &str,
    ) -> Result<String, ProviderError> {
        let mut messages: Vec<Message> = history.to_vec();
        messages.push(Message::user(format!(
            "The following error occurred:\n\n{}\n\nWhat is the best way to fix it on a Linux system? If possible, give the fix as a shell command or a Markdown code block; otherwise give a short explanation.",
            error_log
        )));

        self.advisor
            .complete(&messages, CompletionOptions::default())
            .await
    }

    /// Fresh code from an instruction. Returns extracted code, not the raw
    /// model reply.
    pub async fn generate_code(
        &self,
        history: &[Message],
        instruction: &str,
    ) -> Result<String, ProviderError> {
        let mut messages: Vec<Message> = history.to_vec();
        messages.push(Message::system(CODER_PROMPT));
        messages.push(Message::user(format!("Instruction: {}", instruction)));

        let options = CompletionOptions {
            max_tokens: 1024,
            temperature: 0.7,
        };
        let reply = self.coder.complete(&messages, options).await?;
        Ok(extract_code(&reply))
    }

    /// Corrected code for a failed run, with the error log as context.
    pub async fn repair_code(
        &self,
        history: &[Message],
        error_log: &str,
    ) -> Result<String, ProviderError> {
        let mut messages: Vec<Message> = history.to_vec();
        messages.push(Message::system(REPAIR_PROMPT));
        messages.push(Message::user(format!(
            "Running the code/command produced this error:\n\n{}\n\nFix it or provide complete new Python code. The code must run as-is.",
            error_log
        )));

        let options = CompletionOptions {
            max_tokens: 1024,
            temperature: 0.7,
        };
        let reply = self.coder.complete(&messages, options).await?;
        Ok(extract_code(&reply))
    }

    /// File name for generated code. Never fails: a provider error or an
    /// unusable reply falls back to `generated_code.py`.
    pub async fn script_filename(&self, description: &str) -> String {
        let messages = [
            Message::system(FILENAME_PROMPT),
            Message::user(format!("Code description: {}", description)),
        ];
        let options = CompletionOptions {
            max_tokens: 20,
            temperature: 0.5,
        };

        let raw = match self.chat.complete(&messages, options).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "filename generation failed, using default");
                return "generated_code.py".to_string();
            }
        };

        let sanitized: String = raw
            .trim()
            .to_lowercase()
            .replace(".py", "")
            .chars()
            .map(|c| if c == ' ' { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();

        if sanitized.is_empty() {
            "generated_code.py".to_string()
        } else {
            format!("{}.py", sanitized)
        }
    }

    /// Free-form conversational answer, threading caller-supplied context
    /// references ahead of the recent transcript.
    pub async fn conversation_reply(
        &self,
        context: &[Message],
        history: &[Message],
        text: &str,
    ) -> Result<String, ProviderError> {
        let mut messages: Vec<Message> = context.to_vec();
        messages.extend_from_slice(history);
        messages.push(Message::user(text));

        let options = CompletionOptions {
            max_tokens: 256,
            temperature: 0.7,
        };
        self.chat.complete(&messages, options).await
    }
}
