use crate::files::FileStore;
use crate::markdown::escape_markdown_v1;
use crate::recovery::RecoveryFlow;
use async_trait::async_trait;
use shellsage_executor::{Advisor, AdvisorError, ExecutionOutcome, Messenger, ShellObserver};
use shellsage_memory::{ChatHistoryStore, ResponseKind, SessionContext, SessionContextStore};
use shellsage_policy::CommandFilter;
use shellsage_providers::{AssistantModels, Intent, Message};
use std::sync::Arc;

/// Chat turns of history handed to the model as context.
const HISTORY_CONTEXT_TURNS: usize = 10;

/// Bridges the observer's suggestion seam onto the advisor model, threading
/// the session's recent transcript into the request.
struct ModelAdvisor {
    models: Arc<AssistantModels>,
    history: Arc<ChatHistoryStore>,
}

#[async_trait]
impl Advisor for ModelAdvisor {
    async fn advise(&self, session_id: &str, error_log: &str) -> Result<String, AdvisorError> {
        let history = recent_messages(&self.history, session_id);
        self.models
            .suggest_repair(&history, error_log)
            .await
            .map_err(|e| AdvisorError(e.to_string()))
    }
}

/// Routes each inbound message: a session waiting on the debug confirmation
/// goes straight to the recovery flow; everything else is classified by
/// intent and dispatched to the shell, program, or conversation path.
pub struct ConversationEngine {
    sessions: Arc<SessionContextStore>,
    history: Arc<ChatHistoryStore>,
    models: Arc<AssistantModels>,
    messenger: Arc<dyn Messenger>,
    files: Arc<dyn FileStore>,
    observer: ShellObserver,
    recovery: RecoveryFlow,
    filter: CommandFilter,
}

impl ConversationEngine {
    pub fn new(
        sessions: Arc<SessionContextStore>,
        history: Arc<ChatHistoryStore>,
        models: Arc<AssistantModels>,
        messenger: Arc<dyn Messenger>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let advisor = Arc::new(ModelAdvisor {
            models: Arc::clone(&models),
            history: Arc::clone(&history),
        });
        let observer = ShellObserver::new(Arc::clone(&messenger), advisor);
        let recovery = RecoveryFlow::new(
            Arc::clone(&messenger),
            Arc::clone(&models),
            Arc::clone(&files),
        );

        Self {
            sessions,
            history,
            models,
            messenger,
            files,
            observer,
            recovery,
            filter: CommandFilter::new(),
        }
    }

    /// Handles one user message for one session. Collaborator failures are
    /// reported to the user as text; nothing here is retried.
    pub async fn handle_message(&self, session_id: &str, text: &str) {
        let handle = self.sessions.get(session_id);

        // Explicit in-flight guard: the observer holds this lock for the
        // whole command cycle.
        let Ok(mut ctx) = handle.context.try_lock() else {
            self.messenger
                .send(
                    session_id,
                    "A command is still running for this chat. Send /stop to interrupt it first.",
                )
                .await;
            return;
        };

        if ctx.awaiting_debug_response {
            let history = recent_messages(&self.history, session_id);
            let outcome = self
                .recovery
                .handle_reply(session_id, &mut ctx, &history, text)
                .await;
            tracing::debug!(session_id, ?outcome, "recovery reply handled");
            return;
        }

        match self.models.detect_intent(text).await {
            Intent::Shell => {
                self.handle_shell_request(session_id, &mut ctx, &handle.interrupt, text)
                    .await
            }
            Intent::Program => self.handle_program_request(session_id, &mut ctx, text).await,
            Intent::Conversation => self.handle_conversation(session_id, &mut ctx, text).await,
        }
    }

    /// Signals the session's running command, if any. A session with no
    /// in-flight observer simply ignores the notification.
    pub fn interrupt(&self, session_id: &str) {
        self.sessions.get(session_id).interrupt.notify_waiters();
    }

    /// Clears the chat transcript only; a pending recovery conversation and
    /// the rest of the session context stay untouched.
    pub fn clear_history(&self, session_id: &str) -> bool {
        self.history.clear(session_id)
    }

    async fn handle_shell_request(
        &self,
        session_id: &str,
        ctx: &mut SessionContext,
        interrupt: &tokio::sync::Notify,
        text: &str,
    ) {
        self.messenger
            .send(
                session_id,
                &format!("Shell request detected. Translating: `{}`", text),
            )
            .await;

        let history = recent_messages(&self.history, session_id);
        let command = match self.models.to_shell_command(&history, text).await {
            Ok(Some(command)) => command,
            Ok(None) => {
                self.messenger
                    .send(
                        session_id,
                        "Sorry, I could not turn that into a clear shell command. Please give a more specific instruction.",
                    )
                    .await;
                ctx.last_response_kind = ResponseKind::None;
                ctx.last_generated_code = None;
                return;
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "command conversion failed");
                self.messenger
                    .send(
                        session_id,
                        &format!("Problem while converting the instruction: {}", e),
                    )
                    .await;
                ctx.last_response_kind = ResponseKind::None;
                ctx.last_generated_code = None;
                return;
            }
        };

        // The filter runs on every command before spawn, including
        // converted ones; results are never cached.
        if self.filter.is_dangerous(&command) {
            self.messenger
                .send(
                    session_id,
                    &format!(
                        "This command is not allowed to run: `{}`. Please use another command.",
                        command
                    ),
                )
                .await;
            ctx.last_response_kind = ResponseKind::None;
            ctx.last_generated_code = None;
            return;
        }

        self.messenger
            .send(session_id, &format!("Running as: `{}`", command))
            .await;
        ctx.last_response_kind = ResponseKind::Shell;
        ctx.last_generated_code = None;

        let outcome = self
            .observer
            .observe(&command, session_id, ctx, interrupt)
            .await;
        tracing::info!(session_id, ?outcome, "observed command finished");
        debug_assert!(
            !matches!(outcome, ExecutionOutcome::Completed { error_detected: true })
                || ctx.awaiting_debug_response,
            "error-detected completion must arm the recovery conversation"
        );
    }

    async fn handle_program_request(
        &self,
        session_id: &str,
        ctx: &mut SessionContext,
        text: &str,
    ) {
        self.messenger
            .send(
                session_id,
                &format!("Program request detected. Generating code for: `{}`", text),
            )
            .await;

        let filename = self.models.script_filename(text).await;
        let history = recent_messages(&self.history, session_id);

        let code = match self.models.generate_code(&history, text).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(session_id, error = %e, "code generation failed");
                self.messenger
                    .send(
                        session_id,
                        &format!("Problem while generating the code: {}", e),
                    )
                    .await;
                ctx.last_response_kind = ResponseKind::None;
                ctx.last_generated_code = None;
                return;
            }
        };

        match self.files.persist(&filename, &code).await {
            Ok(()) => {
                ctx.last_generated_code = Some(code.clone());
                ctx.last_response_kind = ResponseKind::Program;
                ctx.last_command_run = None;
                self.messenger
                    .send(
                        session_id,
                        &format!("Code generated and saved to {}.", filename),
                    )
                    .await;
                self.messenger
                    .send(
                        session_id,
                        &format!("Run it with: `python {}`\n```python\n{}\n```", filename, code),
                    )
                    .await;
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "failed to persist generated code");
                self.messenger
                    .send(
                        session_id,
                        &format!("Failed to save the generated code: {}", e),
                    )
                    .await;
                ctx.last_response_kind = ResponseKind::None;
                ctx.last_generated_code = None;
            }
        }
    }

    async fn handle_conversation(&self, session_id: &str, ctx: &mut SessionContext, text: &str) {
        let context_refs = context_references(ctx);
        let history = recent_messages(&self.history, session_id);

        match self
            .models
            .conversation_reply(&context_refs, &history, text)
            .await
        {
            Ok(answer) => {
                self.history.append(session_id, "user", text);
                self.history.append(session_id, "assistant", &answer);
                self.messenger
                    .send(session_id, &escape_markdown_v1(&answer))
                    .await;
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "conversation reply failed");
                self.messenger
                    .send(
                        session_id,
                        &format!("Problem while answering: {}", e),
                    )
                    .await;
            }
        }

        ctx.last_response_kind = ResponseKind::Conversation;
        ctx.last_command_run = None;
        ctx.last_generated_code = None;
    }
}

fn recent_messages(history: &ChatHistoryStore, session_id: &str) -> Vec<Message> {
    history
        .recent(session_id, HISTORY_CONTEXT_TURNS)
        .into_iter()
        .map(|entry| Message {
            role: entry.role,
            content: entry.content,
        })
        .collect()
}

/// System-context references to the most recent interaction, mirrored into
/// conversational answers so follow-up questions can refer back to "that
/// command" or "that code".
fn context_references(ctx: &SessionContext) -> Vec<Message> {
    let mut refs = Vec::new();

    if let (Some(command), ResponseKind::Shell) = (&ctx.last_command_run, ctx.last_response_kind) {
        refs.push(Message::system(format!(
            "The user just ran the shell command: `{}`. Consider this context in your answer.",
            command
        )));
    }

    if let (Some(code), ResponseKind::Program) =
        (&ctx.last_generated_code, ctx.last_response_kind)
    {
        refs.push(Message::system(format!(
            "The user just received the following Python code:\n```python\n{}\n```\nConsider this context in your answer.",
            code
        )));
    }

    if let Some(log) = &ctx.last_error_log {
        let command = ctx.last_command_run.as_deref().unwrap_or("the last command");
        refs.push(Message::system(format!(
            "The user hit an error after running `{}`:\n```\n{}\n```\nConsider this context in your answer.",
            command,
            tail_chars(log, 500)
        )));
    }

    refs
}

fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileStoreError;
    use parking_lot::Mutex;
    use shellsage_providers::{CompletionOptions, LanguageModel, ProviderError};

    struct RecordingMessenger {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingMessenger {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn joined(&self) -> String {
            self.sent.lock().join("\n---\n")
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send(&self, _session_id: &str, text: &str) {
            self.sent.lock().push(text.to_string());
        }
    }

    struct ScriptedModel {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[Message],
            _options: CompletionOptions,
        ) -> Result<String, ProviderError> {
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                Ok(String::new())
            } else {
                Ok(replies.remove(0))
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct RecordingFileStore {
        saved: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl FileStore for RecordingFileStore {
        async fn persist(&self, filename: &str, content: &str) -> Result<(), FileStoreError> {
            self.saved
                .lock()
                .push((filename.to_string(), content.to_string()));
            Ok(())
        }
    }

    fn engine_with(
        replies: Vec<&str>,
    ) -> (
        ConversationEngine,
        Arc<RecordingMessenger>,
        Arc<SessionContextStore>,
        Arc<RecordingFileStore>,
    ) {
        let model: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::new(replies));
        let models = Arc::new(AssistantModels {
            intent: Arc::clone(&model),
            converter: Arc::clone(&model),
            coder: Arc::clone(&model),
            advisor: Arc::clone(&model),
            chat: model,
        });
        let messenger = Arc::new(RecordingMessenger::new());
        let sessions = Arc::new(SessionContextStore::new());
        let files = Arc::new(RecordingFileStore {
            saved: Mutex::new(Vec::new()),
        });
        let engine = ConversationEngine::new(
            Arc::clone(&sessions),
            Arc::new(ChatHistoryStore::new()),
            models,
            messenger.clone(),
            files.clone(),
        );
        (engine, messenger, sessions, files)
    }

    #[tokio::test]
    async fn test_shell_intent_runs_converted_command() {
        // intent -> "shell", conversion -> echo
        let (engine, messenger, sessions, _files) =
            engine_with(vec!["shell", "echo engine-test"]);

        engine.handle_message("chat:1", "print something").await;

        assert!(messenger.joined().contains("engine-test"));
        let handle = sessions.get("chat:1");
        let ctx = handle.context.lock().await;
        assert_eq!(ctx.last_command_run.as_deref(), Some("echo engine-test"));
        assert_eq!(ctx.last_response_kind, ResponseKind::Shell);
        assert!(!ctx.awaiting_debug_response);
    }

    #[tokio::test]
    async fn test_dangerous_command_never_spawns() {
        let (engine, messenger, sessions, _files) =
            engine_with(vec!["shell", "rm -rf /data"]);

        engine.handle_message("chat:1", "wipe the data dir").await;

        assert!(messenger.joined().contains("not allowed"));
        let handle = sessions.get("chat:1");
        let ctx = handle.context.lock().await;
        // The observer never started, so no command was recorded.
        assert!(ctx.last_command_run.is_none());
        assert_eq!(ctx.last_response_kind, ResponseKind::None);
    }

    #[tokio::test]
    async fn test_unconvertible_instruction_is_apologized() {
        let (engine, messenger, _sessions, _files) =
            engine_with(vec!["shell", "NOT_CONVERTIBLE"]);

        engine.handle_message("chat:1", "do the vague thing").await;

        assert!(messenger.joined().contains("more specific"));
    }

    #[tokio::test]
    async fn test_program_intent_persists_generated_code() {
        // intent, filename, code
        let (engine, messenger, sessions, files) = engine_with(vec![
            "program",
            "fizzbuzz",
            "```python\nprint('fizz')\n```",
        ]);

        engine.handle_message("chat:1", "write fizzbuzz").await;

        let saved = files.saved.lock().clone();
        assert_eq!(
            saved,
            vec![("fizzbuzz.py".to_string(), "print('fizz')".to_string())]
        );
        assert!(messenger.joined().contains("saved to fizzbuzz.py"));

        let handle = sessions.get("chat:1");
        let ctx = handle.context.lock().await;
        assert_eq!(ctx.last_response_kind, ResponseKind::Program);
        assert_eq!(ctx.last_generated_code.as_deref(), Some("print('fizz')"));
    }

    #[tokio::test]
    async fn test_conversation_intent_answers_and_records_history() {
        let (engine, messenger, _sessions, _files) =
            engine_with(vec!["conversation", "hello there!"]);

        engine.handle_message("chat:1", "hi").await;

        assert!(messenger.joined().contains("hello there!"));
    }

    #[tokio::test]
    async fn test_busy_session_gets_still_running_notice() {
        let (engine, messenger, sessions, _files) = engine_with(vec![]);

        let handle = sessions.get("chat:1");
        let _guard = handle.context.lock().await;

        engine.handle_message("chat:1", "anything").await;

        assert!(messenger.joined().contains("still running"));
    }

    #[tokio::test]
    async fn test_awaiting_session_routes_reply_to_recovery() {
        // Only the coder reply is consumed: recovery short-circuits intent
        // detection entirely.
        let (engine, messenger, sessions, files) =
            engine_with(vec!["```python\nfixed = True\n```"]);

        {
            let handle = sessions.get("chat:1");
            let mut ctx = handle.context.lock().await;
            ctx.last_command_run = Some("python broken.py".to_string());
            ctx.last_error_log = Some("Traceback".to_string());
            ctx.awaiting_debug_response = true;
        }

        engine.handle_message("chat:1", "ya").await;

        assert_eq!(files.saved.lock()[0].0, "broken.py");
        let handle = sessions.get("chat:1");
        let ctx = handle.context.lock().await;
        assert!(!ctx.awaiting_debug_response);
        assert!(ctx.last_error_log.is_none());
        assert!(messenger.joined().contains("repaired version"));
    }

    #[tokio::test]
    async fn test_interrupt_on_idle_session_is_harmless() {
        let (engine, _messenger, sessions, _files) = engine_with(vec![]);
        engine.interrupt("chat:1");
        let handle = sessions.get("chat:1");
        assert!(handle.context.try_lock().is_ok());
    }
}
