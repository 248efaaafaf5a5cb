pub mod engine;
pub mod files;
pub mod markdown;
pub mod recovery;

pub use engine::ConversationEngine;
pub use files::{FileStore, FileStoreError};
pub use recovery::{RecoveryFlow, RecoveryOutcome};
