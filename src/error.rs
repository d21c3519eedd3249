use thiserror::Error;

use crate::models::provider::{ProviderAttempt, ProviderName};

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（致命，不重试）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 题目生成错误
    #[error("生成错误: {0}")]
    Generation(#[from] GenerationError),
    /// 请求参数错误
    #[error("请求参数错误: {0}")]
    InvalidRequest(String),
    /// 调用方取消了请求
    #[error("请求已取消")]
    Cancelled,
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 正则表达式编译失败
    #[error("正则表达式错误: {0}")]
    Regex(#[from] regex::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 没有任何可用的 provider
    #[error("没有配置任何可用的生成服务 (请设置 OPENAI_API_KEY / GEMINI_API_KEY / GROQ_API_KEY)")]
    NoProviderConfigured,
    /// 纯图片请求，但已配置的 provider 都不支持图片
    #[error("请求只包含图片，但已配置的生成服务 [{configured}] 都不支持图片输入 (请设置 OPENAI_API_KEY 或 GEMINI_API_KEY)")]
    NoVisionProvider { configured: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败（网络 / 后端错误）
    #[error("LLM API调用失败 ({provider}): {reason}")]
    ApiCallFailed {
        provider: ProviderName,
        reason: String,
    },
    /// 请求超时
    #[error("LLM 请求超时 ({provider}): 超过 {seconds} 秒")]
    Timeout { provider: ProviderName, seconds: u64 },
    /// 返回内容为空
    #[error("LLM返回内容为空 ({provider})")]
    EmptyContent { provider: ProviderName },
    /// 构建请求失败
    #[error("构建 LLM 请求失败 ({provider}): {reason}")]
    RequestBuildFailed {
        provider: ProviderName,
        reason: String,
    },
    /// 所有 provider 都失败
    #[error("所有生成服务均失败: {}", format_attempts(.attempts))]
    AllProvidersFailed { attempts: Vec<ProviderAttempt> },
}

/// 题目生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 响应无法解析为 JSON 数组
    #[error("LLM 响应格式错误: {reason} (响应片段: {preview})")]
    MalformedResponse { reason: String, preview: String },
    /// 尝试次数用尽仍未得到有效题目
    #[error("题目生成耗尽: 请求 {requested} 道，仅得到 {produced} 道有效题目 (共尝试 {attempts} 次)")]
    ValidationExhausted {
        requested: usize,
        produced: usize,
        attempts: usize,
    },
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// 是否为致命错误
    ///
    /// 致命错误不会触发 fallback 到下一个 provider
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::InvalidRequest(_) | AppError::Cancelled
        )
    }

    /// 创建请求参数错误
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        AppError::InvalidRequest(msg.into())
    }

    /// 创建 LLM API 调用错误
    pub fn llm_api_failed(provider: ProviderName, reason: impl std::fmt::Display) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            provider,
            reason: reason.to_string(),
        })
    }

    /// 创建响应格式错误
    pub fn malformed_response(reason: impl Into<String>, raw: &str) -> Self {
        AppError::Generation(GenerationError::MalformedResponse {
            reason: reason.into(),
            preview: crate::utils::logging::truncate_text(raw, 80),
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
