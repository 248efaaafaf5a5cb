pub mod batch;
pub mod classifier;
pub mod observer;
pub mod pty;
pub mod traits;

pub use batch::DeliveryBatcher;
pub use classifier::FailureClassifier;
pub use observer::{ExecutionOutcome, ShellObserver};
pub use pty::{spawn_shell, ShellChild, SpawnError};
pub use traits::{Advisor, AdvisorError, Messenger};
