pub mod assistant;
pub mod extract;
pub mod openai_compatible;
pub mod traits;

pub use assistant::{AssistantModels, Intent};
pub use openai_compatible::OpenAiCompatibleClient;
pub use traits::{CompletionOptions, LanguageModel, Message, ProviderError};
