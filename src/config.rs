use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppResult, ConfigError};

/// 题目批量生成策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStrategy {
    /// 并行超量请求，合并去重后截断
    #[default]
    Parallel,
    /// 顺序重试，补足缺口
    Sequential,
}

impl FromStr for BatchStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(BatchStrategy::Parallel),
            "sequential" | "retry" => Ok(BatchStrategy::Sequential),
            _ => Err(()),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- OpenAI（主） ---
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    // --- Gemini ---
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    // --- Groq ---
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,
    pub groq_model: String,
    /// 普通请求超时（秒）
    pub request_timeout_secs: u64,
    /// 出题请求超时（秒）
    pub question_timeout_secs: u64,
    /// 单次最多生成题目数
    pub max_question_count: usize,
    /// 每个子批次的题目数
    pub batch_size: usize,
    /// 超量请求比例
    pub over_fetch_ratio: f64,
    /// 顺序重试策略的最大尝试次数
    pub retry_attempts: usize,
    pub batch_strategy: BatchStrategy,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            groq_api_key: None,
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            request_timeout_secs: 60,
            question_timeout_secs: 120,
            max_question_count: 25,
            batch_size: 8,
            over_fetch_ratio: 1.5,
            retry_attempts: 3,
            batch_strategy: BatchStrategy::Parallel,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取 TOML 配置文件（如果提供），再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            openai_api_key: env_secret("OPENAI_API_KEY").or(self.openai_api_key),
            openai_base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(self.openai_base_url),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or(self.openai_model),
            gemini_api_key: env_secret("GEMINI_API_KEY").or(self.gemini_api_key),
            gemini_base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(self.gemini_base_url),
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or(self.gemini_model),
            groq_api_key: env_secret("GROQ_API_KEY").or(self.groq_api_key),
            groq_base_url: std::env::var("GROQ_BASE_URL").unwrap_or(self.groq_base_url),
            groq_model: std::env::var("GROQ_MODEL").unwrap_or(self.groq_model),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs),
            question_timeout_secs: env_parse("QUESTION_TIMEOUT_SECS").unwrap_or(self.question_timeout_secs),
            max_question_count: env_parse("MAX_QUESTION_COUNT").unwrap_or(self.max_question_count),
            batch_size: env_parse("QUESTION_BATCH_SIZE").unwrap_or(self.batch_size),
            over_fetch_ratio: env_parse("OVER_FETCH_RATIO").unwrap_or(self.over_fetch_ratio),
            retry_attempts: env_parse("RETRY_ATTEMPTS").unwrap_or(self.retry_attempts),
            batch_strategy: env_parse("BATCH_STRATEGY").unwrap_or(self.batch_strategy),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    /// 当前配置中的凭据快照
    pub fn credentials(&self) -> Credentials {
        Credentials {
            openai: ApiCredential::maybe(&self.openai_api_key, &self.openai_base_url, &self.openai_model),
            gemini: ApiCredential::maybe(&self.gemini_api_key, &self.gemini_base_url, &self.gemini_model),
            groq: ApiCredential::maybe(&self.groq_api_key, &self.groq_base_url, &self.groq_model),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn question_timeout(&self) -> Duration {
        Duration::from_secs(self.question_timeout_secs)
    }
}

/// 空字符串视为未配置
fn env_secret(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(var_name: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(
                "{}",
                ConfigError::EnvVarParseFailed {
                    var_name: var_name.to_string(),
                    value,
                    expected_type: std::any::type_name::<T>().to_string(),
                }
            );
            None
        }
    }
}

/// 单个 provider 的凭据
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiCredential {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ApiCredential {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn maybe(api_key: &Option<String>, base_url: &str, model: &str) -> Option<Self> {
        api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Self::new(k, base_url, model))
    }
}

/// 每次请求解析一次的凭据值对象
///
/// ProviderRegistry 只依赖它，不读取任何全局状态
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub openai: Option<ApiCredential>,
    pub gemini: Option<ApiCredential>,
    pub groq: Option<ApiCredential>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.openai.is_none() && self.gemini.is_none() && self.groq.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keys_are_not_credentials() {
        let config = Config {
            openai_api_key: Some("   ".into()),
            gemini_api_key: Some("g-key".into()),
            ..Default::default()
        };
        let creds = config.credentials();
        assert!(creds.openai.is_none());
        assert_eq!(creds.gemini.as_ref().map(|c| c.api_key.as_str()), Some("g-key"));
        assert!(creds.groq.is_none());
        assert!(!creds.is_empty());
        assert!(Config::default().credentials().is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            groq_api_key = "k"
            batch_size = 5
            batch_strategy = "sequential"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_strategy, BatchStrategy::Sequential);
        assert_eq!(config.max_question_count, 25);
        assert_eq!(config.groq_model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_toml_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_batch_strategy_from_str() {
        assert_eq!("Sequential".parse::<BatchStrategy>(), Ok(BatchStrategy::Sequential));
        assert_eq!("parallel".parse::<BatchStrategy>(), Ok(BatchStrategy::Parallel));
        assert!("other".parse::<BatchStrategy>().is_err());
    }
}
