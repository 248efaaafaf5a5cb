pub mod history;
pub mod store;
pub mod types;

pub use history::{ChatHistoryStore, HistoryEntry};
pub use store::{SessionContextStore, SessionHandle};
pub use types::{ResponseKind, SessionContext};
