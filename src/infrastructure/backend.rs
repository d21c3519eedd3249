//! 生成后端抽象 - 基础设施层
//!
//! 每个具体后端（OpenAI / Gemini / Groq）只需实现 [`GenerationBackend`]，
//! 上层只认识这个 trait，不关心各家 SDK 的差异

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{ChatTurn, ImageAttachment, ProviderName};

/// 一次补全请求
///
/// `messages` 为对话历史，图片附加在最后一条用户消息上
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatTurn>,
    pub images: Vec<ImageAttachment>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// 单条用户消息的请求
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::from_messages(vec![ChatTurn::user(prompt)])
    }

    pub fn from_messages(messages: Vec<ChatTurn>) -> Self {
        Self {
            system: None,
            messages,
            images: Vec::new(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// 最后一条用户消息的下标
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.role == crate::models::ChatRole::User)
    }
}

/// 生成后端
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> ProviderName;

    fn supports_vision(&self) -> bool;

    /// 发送请求并返回原始文本
    ///
    /// 超时、空内容检查由调用方（ProviderConfig）统一处理
    async fn complete_text(&self, request: &CompletionRequest) -> AppResult<String>;
}
