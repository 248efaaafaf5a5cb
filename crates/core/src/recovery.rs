use crate::files::FileStore;
use shellsage_executor::Messenger;
use shellsage_memory::{ResponseKind, SessionContext};
use shellsage_policy::InterpreterInvocation;
use shellsage_providers::{AssistantModels, Message};
use std::sync::Arc;

/// Where the confirmation conversation went after one user reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// A repaired script was written; back to idle.
    Applied { filename: String },
    /// The user declined, or no fix could be produced; back to idle.
    Declined,
    /// Generation or persistence failed; reported, back to idle.
    Failed,
    /// Unrecognized answer; still waiting for a valid yes/no.
    AwaitingAnswer,
}

const AFFIRMATIVE: &[&str] = &["yes", "ya"];
const NEGATIVE: &[&str] = &["no", "tidak"];
const FALLBACK_FIX_FILENAME: &str = "debug_code.py";

/// The confirmation half of error recovery. A session enters here only
/// after the observer finished a run with a captured error log and armed
/// `awaiting_debug_response`; every exit except a re-prompt clears that
/// state again.
pub struct RecoveryFlow {
    messenger: Arc<dyn Messenger>,
    models: Arc<AssistantModels>,
    files: Arc<dyn FileStore>,
}

impl RecoveryFlow {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        models: Arc<AssistantModels>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            messenger,
            models,
            files,
        }
    }

    /// Interprets one user reply while the session awaits the debug
    /// confirmation. There is no timeout: an unrecognized answer re-prompts
    /// and the state persists until a valid answer arrives.
    pub async fn handle_reply(
        &self,
        session_id: &str,
        ctx: &mut SessionContext,
        history: &[Message],
        reply: &str,
    ) -> RecoveryOutcome {
        let answer = reply.trim().to_lowercase();

        if AFFIRMATIVE.contains(&answer.as_str()) {
            let outcome = self.apply_fix(session_id, ctx, history).await;
            ctx.reset_recovery();
            outcome
        } else if NEGATIVE.contains(&answer.as_str()) {
            tracing::info!(session_id, "debugging declined");
            self.messenger.send(session_id, "Debugging cancelled.").await;
            ctx.reset_recovery();
            RecoveryOutcome::Declined
        } else {
            self.messenger
                .send(session_id, "Please answer 'yes' or 'no'.")
                .await;
            RecoveryOutcome::AwaitingAnswer
        }
    }

    async fn apply_fix(
        &self,
        session_id: &str,
        ctx: &mut SessionContext,
        history: &[Message],
    ) -> RecoveryOutcome {
        tracing::info!(session_id, "starting debugging session");
        self.messenger
            .send(session_id, "Starting the debugging session...")
            .await;

        let Some(error_log) = ctx.last_error_log.clone() else {
            // Guard for the invariant: awaiting implies a captured log.
            self.messenger
                .send(session_id, "No error log is available to debug.")
                .await;
            return RecoveryOutcome::Declined;
        };

        self.messenger
            .send(
                session_id,
                "Asking the model to analyze the error and produce a fix...",
            )
            .await;

        let code = match self.models.repair_code(history, &error_log).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(session_id, error = %e, "fix generation failed");
                ctx.last_generated_code = None;
                self.messenger
                    .send(session_id, &format!("Problem while debugging: {}", e))
                    .await;
                return RecoveryOutcome::Failed;
            }
        };

        // Recover the fix target from the failed command; an unmatched
        // shape falls back to a scratch file.
        let invocation = ctx
            .last_command_run
            .as_deref()
            .and_then(InterpreterInvocation::parse);
        let filename = invocation
            .as_ref()
            .map(|inv| inv.script.clone())
            .unwrap_or_else(|| FALLBACK_FIX_FILENAME.to_string());

        match self.files.persist(&filename, &code).await {
            Ok(()) => {
                ctx.last_generated_code = Some(code.clone());
                ctx.last_response_kind = ResponseKind::Program;
                self.messenger
                    .send(
                        session_id,
                        &format!("The AI wrote a repaired version to {}.", filename),
                    )
                    .await;
                let rerun = invocation
                    .map(|inv| inv.rerun_hint())
                    .unwrap_or_else(|| format!("python {}", filename));
                self.messenger
                    .send(
                        session_id,
                        &format!(
                            "Review it and try again with: `{}`\n```python\n{}\n```",
                            rerun, code
                        ),
                    )
                    .await;
                RecoveryOutcome::Applied { filename }
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "failed to persist repaired code");
                ctx.last_generated_code = None;
                ctx.last_response_kind = ResponseKind::None;
                self.messenger
                    .send(
                        session_id,
                        &format!("Failed to save the repaired code: {}", e),
                    )
                    .await;
                RecoveryOutcome::Failed
            }
        }
    }
}
