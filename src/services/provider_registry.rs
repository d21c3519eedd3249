//! Provider 注册表 - 业务能力层
//!
//! 根据当前持有的凭据解析出有序的 provider 列表：
//! OpenAI（主）→ Gemini → Groq，没有配置 key 的直接跳过

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Credentials;
use crate::error::{AppError, AppResult, ConfigError, LlmError};
use crate::infrastructure::{CompletionRequest, GeminiBackend, GenerationBackend, OpenAiBackend};
use crate::models::ProviderName;

/// 一个可用的 provider
///
/// 在一次请求的生命周期内不可变，clone 只增加引用计数
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: ProviderName,
    backend: Arc<dyn GenerationBackend>,
}

impl ProviderConfig {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            name: backend.name(),
            backend,
        }
    }

    pub fn supports_vision(&self) -> bool {
        self.backend.supports_vision()
    }

    /// 带超时地调用后端
    ///
    /// - 不支持视觉的后端会收到去掉图片的请求
    /// - 超时视为普通的 provider 失败
    /// - 空白响应视为失败
    pub async fn complete_text(&self, mut request: CompletionRequest, timeout: Duration) -> AppResult<String> {
        if !self.supports_vision() && !request.images.is_empty() {
            debug!("[{}] 不支持图片，忽略 {} 张附件", self.name, request.images.len());
            request.images.clear();
        }

        let text = tokio::time::timeout(timeout, self.backend.complete_text(&request))
            .await
            .map_err(|_| {
                AppError::Llm(LlmError::Timeout {
                    provider: self.name,
                    seconds: timeout.as_secs(),
                })
            })??;

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Llm(LlmError::EmptyContent { provider: self.name }));
        }
        Ok(text.to_string())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("supports_vision", &self.supports_vision())
            .finish()
    }
}

/// Provider 注册表
///
/// 纯函数：同样的凭据总是得到同样顺序的 provider
pub struct ProviderRegistry {
    credentials: Credentials,
}

impl ProviderRegistry {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// 按固定优先级解析可用 provider，可能为空
    pub fn resolve(&self) -> Vec<ProviderConfig> {
        let mut providers = Vec::new();

        if let Some(cred) = &self.credentials.openai {
            providers.push(ProviderConfig::new(Arc::new(OpenAiBackend::new(
                ProviderName::OpenAi,
                cred,
                true,
            ))));
        }
        if let Some(cred) = &self.credentials.gemini {
            providers.push(ProviderConfig::new(Arc::new(GeminiBackend::new(cred))));
        }
        if let Some(cred) = &self.credentials.groq {
            providers.push(ProviderConfig::new(Arc::new(OpenAiBackend::new(
                ProviderName::Groq,
                cred,
                false,
            ))));
        }

        debug!(
            "解析到 {} 个 provider: {:?}",
            providers.len(),
            providers.iter().map(|p| p.name).collect::<Vec<_>>()
        );
        providers
    }

    /// 同 [`resolve`](Self::resolve)，但空列表视为配置错误
    pub fn resolve_required(&self) -> AppResult<Vec<ProviderConfig>> {
        let providers = self.resolve();
        if providers.is_empty() {
            return Err(ConfigError::NoProviderConfigured.into());
        }
        Ok(providers)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! 测试用的脚本化后端

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按顺序返回预设响应的后端，并记录收到的请求
    pub struct ScriptedBackend {
        pub provider: ProviderName,
        pub vision: bool,
        responses: Mutex<VecDeque<AppResult<String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(provider: ProviderName, responses: Vec<AppResult<String>>) -> Self {
            Self {
                provider,
                vision: true,
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn text_only(mut self) -> Self {
            self.vision = false;
            self
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> ProviderName {
            self.provider
        }

        fn supports_vision(&self) -> bool {
            self.vision
        }

        async fn complete_text(&self, request: &CompletionRequest) -> AppResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::llm_api_failed(self.provider, "脚本已耗尽")))
        }
    }

    /// 永远不返回的后端，用于超时和取消测试
    pub struct HangingBackend(pub ProviderName);

    #[async_trait]
    impl GenerationBackend for HangingBackend {
        fn name(&self) -> ProviderName {
            self.0
        }

        fn supports_vision(&self) -> bool {
            false
        }

        async fn complete_text(&self, _request: &CompletionRequest) -> AppResult<String> {
            futures::future::pending::<AppResult<String>>().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{HangingBackend, ScriptedBackend};
    use super::*;
    use crate::config::ApiCredential;
    use crate::models::ImageAttachment;

    fn cred(key: &str) -> Option<ApiCredential> {
        Some(ApiCredential::new(key, "http://localhost:9", "m"))
    }

    #[test]
    fn test_resolve_keeps_fixed_order() {
        let registry = ProviderRegistry::new(Credentials {
            groq: cred("groq-key"),
            openai: cred("openai-key"),
            gemini: cred("gemini-key"),
        });
        let names: Vec<_> = registry.resolve().iter().map(|p| p.name).collect();
        assert_eq!(names, vec![ProviderName::OpenAi, ProviderName::Gemini, ProviderName::Groq]);
    }

    #[test]
    fn test_resolve_skips_missing_and_reports_vision() {
        let registry = ProviderRegistry::new(Credentials {
            groq: cred("groq-key"),
            ..Default::default()
        });
        let providers = registry.resolve();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name, ProviderName::Groq);
        assert!(!providers[0].supports_vision());
    }

    #[test]
    fn test_empty_credentials_is_fatal_config_error() {
        let registry = ProviderRegistry::new(Credentials::default());
        assert!(registry.resolve().is_empty());
        let err = registry.resolve_required().unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::NoProviderConfigured)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_complete_text_trims_and_rejects_blank() {
        let provider = ProviderConfig::new(Arc::new(ScriptedBackend::new(
            ProviderName::OpenAi,
            vec![Ok("  摘要内容 \n".into()), Ok("   ".into())],
        )));
        let timeout = Duration::from_secs(5);

        let text = provider.complete_text(CompletionRequest::new("p"), timeout).await.unwrap();
        assert_eq!(text, "摘要内容");

        let err = provider.complete_text(CompletionRequest::new("p"), timeout).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::EmptyContent { .. })));
    }

    #[tokio::test]
    async fn test_text_only_backend_never_sees_images() {
        let backend = Arc::new(ScriptedBackend::new(ProviderName::Groq, vec![Ok("ok".into())]).text_only());
        let provider = ProviderConfig::new(backend.clone());
        let request = CompletionRequest::new("p").with_images(vec![ImageAttachment::from_bytes("image/png", b"x")]);

        provider.complete_text(request, Duration::from_secs(5)).await.unwrap();
        assert!(backend.requests.lock().unwrap()[0].images.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_provider_failure() {
        let provider = ProviderConfig::new(Arc::new(HangingBackend(ProviderName::Gemini)));
        let err = provider
            .complete_text(CompletionRequest::new("p"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::Timeout { provider: ProviderName::Gemini, .. })));
        assert!(!err.is_fatal());
    }
}
