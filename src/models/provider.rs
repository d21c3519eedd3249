use serde::{Deserialize, Serialize};
use std::fmt;

/// 生成服务 provider 枚举
///
/// 顺序即注册顺序：OpenAI 为主，其余为 fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    /// OpenAI（主 provider）
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini
    Gemini,
    /// Groq（OpenAI 兼容接口，仅文本）
    Groq,
}

impl ProviderName {
    /// 固定的优先级顺序
    pub const ALL: [ProviderName; 3] = [ProviderName::OpenAi, ProviderName::Gemini, ProviderName::Groq];

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            ProviderName::OpenAi => "openai",
            ProviderName::Gemini => "gemini",
            ProviderName::Groq => "groq",
        }
    }

    /// 尝试从字符串解析（忽略大小写）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Some(ProviderName::OpenAi),
            "gemini" | "google" => Some(ProviderName::Gemini),
            "groq" => Some(ProviderName::Groq),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单次 provider 尝试的失败记录
///
/// 只用于拼接聚合错误信息，不持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: ProviderName,
    pub error: String,
}

impl ProviderAttempt {
    pub fn new(provider: ProviderName, error: impl Into<String>) -> Self {
        Self {
            provider,
            error: error.into(),
        }
    }
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}
