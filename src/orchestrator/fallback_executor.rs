//! Provider fallback 执行器 - 编排层
//!
//! 按注册表顺序逐个尝试 provider，第一个成功即返回；
//! 全部失败时返回一个列出所有 provider 失败原因的聚合错误

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, ConfigError, LlmError};
use crate::models::{ProviderAttempt, ProviderName};
use crate::services::ProviderConfig;

/// 一次 fallback 执行的结果
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub value: T,
    /// 最终成功的 provider
    pub provider: ProviderName,
    /// 成功之前失败的尝试（按顺序）
    pub failures: Vec<ProviderAttempt>,
}

/// Fallback 执行器
///
/// 每个 provider 只尝试一次，不在本层重试
#[derive(Debug, Clone, Default)]
pub struct FallbackExecutor {
    cancel: CancellationToken,
}

impl FallbackExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定调用方的取消信号
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// 依次对每个 provider 执行 `operation`
    ///
    /// - provider 列表为空：配置错误，立即返回
    /// - 致命错误（配置 / 参数 / 取消）：立即返回，不再尝试后续 provider
    /// - 取消：正在进行的调用被丢弃，不返回部分结果
    pub async fn run<T, F, Fut>(
        &self,
        providers: &[ProviderConfig],
        mut operation: F,
    ) -> AppResult<FallbackOutcome<T>>
    where
        F: FnMut(ProviderConfig) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if providers.is_empty() {
            return Err(ConfigError::NoProviderConfigured.into());
        }

        let mut failures: Vec<ProviderAttempt> = Vec::new();

        for (idx, provider) in providers.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            info!("🤖 [{}/{}] 尝试 provider: {}", idx + 1, providers.len(), provider.name);

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("[{}] 请求被取消，放弃进行中的调用", provider.name);
                    return Err(AppError::Cancelled);
                }
                result = operation(provider.clone()) => result,
            };

            match result {
                Ok(value) => {
                    if failures.is_empty() {
                        info!("✓ [{}] 调用成功", provider.name);
                    } else {
                        info!("✓ [{}] 调用成功 (此前 {} 个 provider 失败)", provider.name, failures.len());
                    }
                    return Ok(FallbackOutcome {
                        value,
                        provider: provider.name,
                        failures,
                    });
                }
                Err(e) if e.is_fatal() => {
                    error!("[{}] ❌ 致命错误，停止 fallback: {}", provider.name, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("[{}] ⚠️ 调用失败，尝试下一个 provider: {}", provider.name, e);
                    failures.push(ProviderAttempt::new(provider.name, e.to_string()));
                }
            }
        }

        error!("❌ 所有 {} 个 provider 均失败", failures.len());
        Err(LlmError::AllProvidersFailed { attempts: failures }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::CompletionRequest;
    use crate::services::provider_registry::testing::{HangingBackend, ScriptedBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn provider(name: ProviderName, responses: Vec<AppResult<String>>) -> ProviderConfig {
        ProviderConfig::new(Arc::new(ScriptedBackend::new(name, responses)))
    }

    async fn call(provider: ProviderConfig) -> AppResult<String> {
        provider
            .complete_text(CompletionRequest::new("prompt"), Duration::from_secs(5))
            .await
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let providers = vec![
            provider(ProviderName::OpenAi, vec![Ok("from openai".into())]),
            provider(ProviderName::Gemini, vec![Ok("from gemini".into())]),
        ];
        let outcome = FallbackExecutor::new().run(&providers, call).await.unwrap();
        assert_eq!(outcome.value, "from openai");
        assert_eq!(outcome.provider, ProviderName::OpenAi);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_and_records_exactly_one_failure() {
        let providers = vec![
            provider(
                ProviderName::OpenAi,
                vec![Err(AppError::llm_api_failed(ProviderName::OpenAi, "503 unavailable"))],
            ),
            provider(ProviderName::Gemini, vec![Ok("from gemini".into())]),
        ];
        let outcome = FallbackExecutor::new().run(&providers, call).await.unwrap();
        assert_eq!(outcome.value, "from gemini");
        assert_eq!(outcome.provider, ProviderName::Gemini);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, ProviderName::OpenAi);
        assert!(outcome.failures[0].error.contains("503 unavailable"));
    }

    #[tokio::test]
    async fn test_all_failing_error_names_every_provider() {
        let providers = vec![
            provider(ProviderName::OpenAi, vec![Err(AppError::llm_api_failed(ProviderName::OpenAi, "401"))]),
            provider(ProviderName::Gemini, vec![Ok("   ".into())]),
            provider(ProviderName::Groq, vec![Err(AppError::malformed_response("no array", "x"))]),
        ];
        let err = FallbackExecutor::new().run(&providers, call).await.unwrap_err();
        let msg = err.to_string();
        for name in ["openai", "gemini", "groq"] {
            assert!(msg.contains(name), "missing {} in {}", name, msg);
        }
        match err {
            AppError::Llm(LlmError::AllProvidersFailed { attempts }) => assert_eq!(attempts.len(), 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_provider_list_is_config_error() {
        let err = tokio_test::assert_err!(FallbackExecutor::new().run(&[], call).await);
        assert!(matches!(err, AppError::Config(ConfigError::NoProviderConfigured)));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_fallback() {
        let second = Arc::new(ScriptedBackend::new(ProviderName::Gemini, vec![Ok("unused".into())]));
        let providers = vec![
            provider(ProviderName::OpenAi, vec![Err(AppError::invalid_request("bad input"))]),
            ProviderConfig::new(second.clone()),
        ];
        let err = FallbackExecutor::new().run(&providers, call).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_abandons_in_flight_call() {
        let token = CancellationToken::new();
        let providers = vec![ProviderConfig::new(Arc::new(HangingBackend(ProviderName::OpenAi)))];
        let executor = FallbackExecutor::with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = executor
            .run(&providers, |p| async move {
                p.complete_text(CompletionRequest::new("p"), Duration::from_secs(600)).await
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        canceller.await.unwrap();
    }
}
