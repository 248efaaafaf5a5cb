use async_trait::async_trait;
use thiserror::Error;

/// Outbound message delivery. Fire-and-forget: implementations log failures
/// and never surface them into the execution flow.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, session_id: &str, text: &str);
}

#[derive(Debug, Error)]
#[error("suggestion unavailable: {0}")]
pub struct AdvisorError(pub String);

/// Source of remediation advice for a captured error log. Called at most
/// once per observed command, from the observer's failure branch.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, session_id: &str, error_log: &str) -> Result<String, AdvisorError>;
}
