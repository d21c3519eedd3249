pub mod prompt_builder;
pub mod provider_registry;
pub mod response_normalizer;

pub use prompt_builder::PromptBuilder;
pub use provider_registry::{ProviderConfig, ProviderRegistry};
pub use response_normalizer::{dedup_key, Deduplicator, ResponseNormalizer};
