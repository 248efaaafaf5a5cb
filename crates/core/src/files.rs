use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid file name: {0}")]
    InvalidName(String),
}

/// Persistence seam for generated code. The engine and the recovery flow
/// write through this; where files actually land is the application's
/// concern.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn persist(&self, filename: &str, content: &str) -> Result<(), FileStoreError>;
}
