use crate::batch::DeliveryBatcher;
use crate::classifier::FailureClassifier;
use crate::pty::spawn_shell;
use crate::traits::{Advisor, Messenger};
use shellsage_memory::SessionContext;
use std::sync::Arc;
use tokio::sync::Notify;

/// How an observed command ended. Returned after the read loop completes;
/// the caller decides from this whether to arm the recovery conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { error_detected: bool },
    Cancelled,
    SpawnFailed,
    StreamFault,
}

/// Only this much of the accumulated error log is delivered to the user;
/// the full log is retained in the session context for the fix request.
const ERROR_LOG_DELIVERY_CHARS: usize = 2000;

/// Runs one shell command under a pty and streams its output: every line is
/// logged, appended to the session's output accumulator and batched for
/// delivery. For interpreter invocations, the first failure-signature line
/// snapshots the accumulated output and requests a one-shot remediation
/// suggestion.
///
/// The command may run indefinitely; no timeout is imposed here, and the
/// output accumulator grows with the command's chatter. Operators who run
/// unattended commands should wrap them in an external wall-clock limit.
pub struct ShellObserver {
    messenger: Arc<dyn Messenger>,
    advisor: Arc<dyn Advisor>,
    classifier: FailureClassifier,
}

impl ShellObserver {
    pub fn new(messenger: Arc<dyn Messenger>, advisor: Arc<dyn Advisor>) -> Self {
        Self::with_classifier(messenger, advisor, FailureClassifier::new())
    }

    pub fn with_classifier(
        messenger: Arc<dyn Messenger>,
        advisor: Arc<dyn Advisor>,
        classifier: FailureClassifier,
    ) -> Self {
        Self {
            messenger,
            advisor,
            classifier,
        }
    }

    /// Observes one command for one session. The caller has already vetted
    /// the command against the dangerous-command filter and holds the
    /// session's single-writer guard; `interrupt` carries a user-initiated
    /// stop into the read loop.
    pub async fn observe(
        &self,
        command: &str,
        session_id: &str,
        ctx: &mut SessionContext,
        interrupt: &Notify,
    ) -> ExecutionOutcome {
        ctx.begin_command(command);

        tracing::info!(session_id, command, "running observed command");
        self.messenger
            .send(session_id, &format!("Running command: `{}`", command))
            .await;

        let mut child = match spawn_shell(command) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(session_id, error = %e, "failed to spawn command");
                self.messenger
                    .send(
                        session_id,
                        &format!(
                            "Failed to start the command: {}. Check that the command is valid and bash is available.",
                            e
                        ),
                    )
                    .await;
                return ExecutionOutcome::SpawnFailed;
            }
        };

        let classify = self.classifier.applies_to(command);
        let mut batcher = DeliveryBatcher::new();
        let mut suggestion_requested = false;

        let interrupted = interrupt.notified();
        tokio::pin!(interrupted);

        loop {
            tokio::select! {
                _ = &mut interrupted => {
                    child.interrupt();
                    if let Some(batch) = batcher.flush() {
                        self.messenger.send(session_id, &batch).await;
                    }
                    tracing::info!(session_id, "observed command stopped by user");
                    self.messenger
                        .send(session_id, "Process stopped manually.")
                        .await;
                    return ExecutionOutcome::Cancelled;
                }
                maybe_line = child.lines.recv() => {
                    let result = match maybe_line {
                        Some(result) => result,
                        None => break,
                    };

                    let raw = match result {
                        Ok(raw) => raw,
                        Err(e) => {
                            child.kill();
                            if let Some(batch) = batcher.flush() {
                                self.messenger.send(session_id, &batch).await;
                            }
                            tracing::error!(session_id, error = %e, "fault while reading command output");
                            self.messenger
                                .send(
                                    session_id,
                                    &format!("Unexpected fault while reading command output: {}", e),
                                )
                                .await;
                            return ExecutionOutcome::StreamFault;
                        }
                    };

                    let line = raw.trim().to_string();
                    tracing::debug!(session_id, line = %line, "shell output");

                    if let Some(batch) = batcher.push(&line) {
                        self.messenger.send(session_id, &batch).await;
                    }
                    ctx.full_error_output.push(line.clone());

                    if classify && !suggestion_requested && self.classifier.is_failure_line(&line) {
                        suggestion_requested = true;
                        self.handle_failure_line(session_id, ctx, &mut batcher).await;
                    }
                }
            }
        }

        if let Some(batch) = batcher.flush() {
            self.messenger.send(session_id, &batch).await;
        }
        self.messenger.send(session_id, "Command finished.").await;

        if ctx.last_error_log.is_some() {
            ctx.awaiting_debug_response = true;
            self.messenger
                .send(
                    session_id,
                    "The last run hit an error. Should I try to debug it with AI help? (yes/no)",
                )
                .await;
            ExecutionOutcome::Completed {
                error_detected: true,
            }
        } else {
            ExecutionOutcome::Completed {
                error_detected: false,
            }
        }
    }

    /// First failure-signature line of the invocation: snapshot everything
    /// accumulated so far, ask the advisor once, deliver log and advice.
    /// Subsequent failure lines keep accumulating but never re-enter here.
    async fn handle_failure_line(
        &self,
        session_id: &str,
        ctx: &mut SessionContext,
        batcher: &mut DeliveryBatcher,
    ) {
        if let Some(batch) = batcher.flush() {
            self.messenger.send(session_id, &batch).await;
        }

        let error_log = ctx.full_error_output.join("\n");
        ctx.last_error_log = Some(error_log.clone());

        tracing::info!(session_id, "failure signature detected, requesting suggestion");
        self.messenger
            .send(session_id, "Error detected. Asking the model for advice...")
            .await;

        let delivered = tail_chars(&error_log, ERROR_LOG_DELIVERY_CHARS);
        let text = match self.advisor.advise(session_id, &error_log).await {
            Ok(suggestion) => format!(
                "Error detected:\n```\n{}\n```\n\nSuggested fix:\n```\n{}\n```",
                delivered, suggestion
            ),
            Err(e) => format!(
                "Error detected:\n```\n{}\n```\n\nCould not get a suggestion from the model: {}",
                delivered, e
            ),
        };
        self.messenger.send(session_id, &text).await;
    }
}

/// Last `n` characters of a string, on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AdvisorError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    struct CountingAdvisor {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingAdvisor {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Advisor for CountingAdvisor {
        async fn advise(
            &self,
            _session_id: &str,
            _error_log: &str,
        ) -> Result<String, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AdvisorError("advisor offline".to_string()))
            } else {
                Ok("try reinstalling the package".to_string())
            }
        }
    }

    fn write_script(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn observer_with(
        advisor: Arc<CountingAdvisor>,
    ) -> (ShellObserver, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::new());
        let observer = ShellObserver::new(messenger.clone(), advisor);
        (observer, messenger)
    }

    #[tokio::test]
    async fn test_clean_run_completes_without_error() {
        let advisor = Arc::new(CountingAdvisor::new());
        let (observer, _messenger) = observer_with(advisor.clone());
        let mut ctx = SessionContext::default();
        let interrupt = Notify::new();

        let outcome = observer.observe("echo hello", "chat:1", &mut ctx, &interrupt).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                error_detected: false
            }
        );
        assert!(!ctx.awaiting_debug_response);
        assert!(ctx.last_error_log.is_none());
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.last_command_run.as_deref(), Some("echo hello"));
    }

    #[tokio::test]
    async fn test_error_keyword_ignored_for_plain_commands() {
        let advisor = Arc::new(CountingAdvisor::new());
        let (observer, _messenger) = observer_with(advisor.clone());
        let mut ctx = SessionContext::default();
        let interrupt = Notify::new();

        // Not an interpreter invocation, so the literal keyword must not
        // arm remediation.
        let outcome = observer
            .observe("echo error: nothing actually wrong", "chat:1", &mut ctx, &interrupt)
            .await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                error_detected: false
            }
        );
        assert!(ctx.last_error_log.is_none());
        assert!(!ctx.awaiting_debug_response);
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interpreter_failure_arms_recovery_once() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            &dir,
            "broken.sh",
            "echo starting up\necho 'Traceback: ZeroDivisionError'\necho 'second error line'\necho done\n",
        );

        let advisor = Arc::new(CountingAdvisor::new());
        let (observer, messenger) = observer_with(advisor.clone());
        let mut ctx = SessionContext::default();
        let interrupt = Notify::new();

        let outcome = observer
            .observe(&format!("sh {}", script), "chat:1", &mut ctx, &interrupt)
            .await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                error_detected: true
            }
        );
        assert!(ctx.awaiting_debug_response);

        // The snapshot holds everything accumulated up to the triggering
        // line, not just the line itself.
        let log = ctx.last_error_log.clone().unwrap();
        assert!(log.contains("starting up"));
        assert!(log.contains("ZeroDivisionError"));

        // One suggestion request despite two signature lines.
        assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);

        let delivered = messenger.joined();
        assert!(delivered.contains("try reinstalling the package"));
        assert!(delivered.contains("yes/no"));
    }

    #[tokio::test]
    async fn test_advisor_failure_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir, "broken.sh", "echo 'fatal: cannot continue'\n");

        let advisor = Arc::new(CountingAdvisor::failing());
        let (observer, messenger) = observer_with(advisor.clone());
        let mut ctx = SessionContext::default();
        let interrupt = Notify::new();

        let outcome = observer
            .observe(&format!("bash {}", script), "chat:1", &mut ctx, &interrupt)
            .await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                error_detected: true
            }
        );
        assert!(messenger.joined().contains("Could not get a suggestion"));
        assert!(ctx.awaiting_debug_response);
    }

    #[tokio::test]
    async fn test_cancellation_never_arms_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            &dir,
            "slow.sh",
            "echo 'error before the wait'\nsleep 30\n",
        );

        let advisor = Arc::new(CountingAdvisor::new());
        let (observer, messenger) = observer_with(advisor.clone());
        let mut ctx = SessionContext::default();
        let interrupt = Arc::new(Notify::new());

        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            trigger.notify_waiters();
        });

        let outcome = observer
            .observe(&format!("sh {}", script), "chat:1", &mut ctx, &interrupt)
            .await;

        assert_eq!(outcome, ExecutionOutcome::Cancelled);
        assert!(!ctx.awaiting_debug_response);
        assert!(messenger.joined().contains("stopped manually"));
    }

    #[tokio::test]
    async fn test_batches_flush_every_ten_lines() {
        let advisor = Arc::new(CountingAdvisor::new());
        let (observer, messenger) = observer_with(advisor.clone());
        let mut ctx = SessionContext::default();
        let interrupt = Notify::new();

        let outcome = observer
            .observe("seq 1 25", "chat:1", &mut ctx, &interrupt)
            .await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                error_detected: false
            }
        );

        let sent = messenger.sent.lock().clone();
        let batches: Vec<&String> = sent.iter().filter(|m| m.starts_with("```")).collect();
        // 25 lines: two full batches of ten plus the end-of-stream flush.
        assert_eq!(batches.len(), 3);
        let all = batches
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let first = all.find("\n1\n").unwrap();
        let last = all.find("\n25\n").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("hello", 10), "hello");
        assert_eq!(tail_chars("hello", 2), "lo");
        assert_eq!(tail_chars("héllo", 4), "éllo");
        assert_eq!(tail_chars("", 5), "");
    }
}
