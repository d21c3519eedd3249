//! 基础设施层（Infrastructure）
//!
//! 持有网络客户端，只暴露"补全文本"的能力

pub mod backend;
pub mod gemini_backend;
pub mod openai_backend;

pub use backend::{CompletionRequest, GenerationBackend};
pub use gemini_backend::GeminiBackend;
pub use openai_backend::OpenAiBackend;
