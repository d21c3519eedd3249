//! 学习助手流程 - 流程层
//!
//! 核心职责：定义五个入口操作的完整处理流程
//!
//! 每个操作的流程：
//! 1. 校验请求参数（不合法直接返回，不调用任何 provider）
//! 2. 交给 FallbackExecutor 按顺序尝试 provider
//! 3. 在每个 provider 内部构建提示词、调用后端、校验结果

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, Credentials};
use crate::error::{AppError, AppResult, ConfigError};
use crate::infrastructure::CompletionRequest;
use crate::models::{
    ChatRole, ExplainRequest, ExplainResponse, FollowUpRequest, FollowUpResponse,
    GenerateQuestionsRequest, GenerateQuestionsResponse, GenerationRequest, StudyPlanRequest,
    StudyPlanResponse, SummarizeRequest, SummarizeResponse, SummaryComplexity,
};
use crate::orchestrator::{BatchOrchestrator, BatchSettings, FallbackExecutor, FallbackOutcome};
use crate::services::prompt_builder::{
    EXPLAIN_SYSTEM, STUDY_PLAN_SYSTEM, SUMMARY_SYSTEM,
};
use crate::services::{PromptBuilder, ProviderConfig, ProviderRegistry};

/// 摘要要点数量上限
pub const MAX_SUMMARY_POINTS: u32 = 20;
/// 学习计划天数上限
pub const MAX_PLAN_DAYS: u32 = 365;
/// 单次出题数量的硬上限，配置值超过时按此截断
pub const MAX_QUESTION_COUNT: usize = 25;

/// 学习助手
///
/// - 持有本次请求解析出的 provider 列表（不可变）
/// - 不持有任何全局状态，凭据通过 `Credentials` 显式传入
/// - 可以通过 CancellationToken 取消进行中的操作
pub struct StudyAssistant {
    providers: Vec<ProviderConfig>,
    batch: BatchOrchestrator,
    request_timeout: Duration,
    max_question_count: usize,
    cancel: CancellationToken,
}

impl StudyAssistant {
    /// 用显式凭据创建
    pub fn new(config: &Config, credentials: &Credentials) -> Self {
        let providers = ProviderRegistry::new(credentials.clone()).resolve();
        Self::with_providers(config, providers)
    }

    /// 使用配置中的凭据创建
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, &config.credentials())
    }

    /// 使用已经构建好的 provider 列表（测试或自定义后端）
    pub fn with_providers(config: &Config, providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            batch: BatchOrchestrator::new(BatchSettings::from_config(config)),
            request_timeout: config.request_timeout(),
            max_question_count: config.max_question_count.clamp(1, MAX_QUESTION_COUNT),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    fn executor(&self) -> FallbackExecutor {
        FallbackExecutor::with_cancellation(self.cancel.clone())
    }

    /// 纯图片请求只交给支持视觉的 provider
    fn providers_for(&self, has_text: bool, has_images: bool) -> AppResult<Vec<ProviderConfig>> {
        let providers: Vec<ProviderConfig> = self
            .providers
            .iter()
            .filter(|p| has_text || !has_images || p.supports_vision())
            .cloned()
            .collect();

        if providers.is_empty() && !self.providers.is_empty() {
            let configured: Vec<&str> = self.providers.iter().map(|p| p.name.name()).collect();
            return Err(ConfigError::NoVisionProvider {
                configured: configured.join(", "),
            }
            .into());
        }
        Ok(providers)
    }

    /// 文本类操作的公共流程
    ///
    /// 返回 (文本, 是否实际使用了图片)
    async fn complete_with_fallback<F>(
        &self,
        providers: &[ProviderConfig],
        build: F,
    ) -> AppResult<FallbackOutcome<(String, bool)>>
    where
        F: Fn(&ProviderConfig) -> CompletionRequest,
    {
        let build = &build;
        let timeout = self.request_timeout;
        self.executor()
            .run(providers, move |provider| async move {
                let request = build(&provider);
                let vision_used = !request.images.is_empty() && provider.supports_vision();
                let text = provider.complete_text(request, timeout).await?;
                Ok((text, vision_used))
            })
            .await
    }

    /// 生成学习材料摘要
    pub async fn summarize(&self, request: &SummarizeRequest) -> AppResult<SummarizeResponse> {
        let has_text = !request.text.trim().is_empty();
        let has_images = !request.images.is_empty();
        if !has_text && !has_images {
            return Err(AppError::invalid_request("摘要需要提供文本或图片"));
        }
        if let Some(count) = request.count {
            if count == 0 || count > MAX_SUMMARY_POINTS {
                return Err(AppError::invalid_request(format!(
                    "要点数量必须在 1..={} 之间，实际为 {}",
                    MAX_SUMMARY_POINTS, count
                )));
            }
        }

        info!(
            "📝 生成摘要: {:?}, {} 字, {} 张图片",
            request.complexity,
            request.text.chars().count(),
            request.images.len()
        );

        let max_tokens = match request.complexity {
            SummaryComplexity::Comprehensive => 4096,
            _ => 2048,
        };
        let providers = self.providers_for(has_text, has_images)?;
        let outcome = self
            .complete_with_fallback(&providers, |provider| {
                let with_images = has_images && provider.supports_vision();
                let mut completion = CompletionRequest::new(PromptBuilder::summary(request, with_images))
                    .with_system(SUMMARY_SYSTEM)
                    .with_max_tokens(max_tokens)
                    .with_temperature(0.3);
                if with_images {
                    completion = completion.with_images(request.images.clone());
                }
                completion
            })
            .await?;

        let (summary, vision_used) = outcome.value;
        Ok(SummarizeResponse {
            summary,
            provider: outcome.provider,
            vision_used,
        })
    }

    /// 根据学习材料生成练习题
    ///
    /// 结果可能少于请求数量（软降级），但不会超过
    pub async fn generate_questions(
        &self,
        request: &GenerateQuestionsRequest,
    ) -> AppResult<GenerateQuestionsResponse> {
        let has_text = !request.text.trim().is_empty();
        let has_images = !request.images.is_empty();
        if request.count == 0 {
            return Err(AppError::invalid_request("题目数量必须大于 0"));
        }
        if !has_text && !has_images {
            return Err(AppError::invalid_request("出题需要提供学习材料或图片"));
        }

        let count = request.count.min(self.max_question_count);
        if count < request.count {
            info!("请求 {} 道题，超过上限，调整为 {} 道", request.count, count);
        }

        let generation = GenerationRequest::new(request.text.clone(), &request.types, count)
            .with_images(request.images.clone());
        info!(
            "🎯 生成练习题: {} 道, 题型 {:?}, 策略 {:?}",
            count,
            generation.question_types,
            self.batch.settings().strategy
        );

        let providers = self.providers_for(has_text, has_images)?;
        let batch = &self.batch;
        let generation = &generation;
        let outcome = self
            .executor()
            .run(&providers, move |provider| async move {
                batch.generate(&provider, generation).await
            })
            .await?;

        Ok(GenerateQuestionsResponse {
            questions: outcome.value,
            provider: outcome.provider,
        })
    }

    /// 讲解一个概念
    pub async fn explain(&self, request: &ExplainRequest) -> AppResult<ExplainResponse> {
        if request.concept.trim().is_empty() {
            return Err(AppError::invalid_request("需要讲解的概念不能为空"));
        }
        let has_images = !request.images.is_empty();

        info!("💡 讲解概念: {} ({:?})", request.concept.trim(), request.level);

        let outcome = self
            .complete_with_fallback(&self.providers, |provider| {
                let with_images = has_images && provider.supports_vision();
                let mut completion =
                    CompletionRequest::new(PromptBuilder::explanation(request, with_images))
                        .with_system(EXPLAIN_SYSTEM)
                        .with_max_tokens(2048)
                        .with_temperature(0.5);
                if with_images {
                    completion = completion.with_images(request.images.clone());
                }
                completion
            })
            .await?;

        let (explanation, vision_used) = outcome.value;
        Ok(ExplainResponse {
            explanation,
            provider: outcome.provider,
            vision_used,
        })
    }

    /// 制定学习计划
    pub async fn create_study_plan(&self, request: &StudyPlanRequest) -> AppResult<StudyPlanResponse> {
        if request.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(AppError::invalid_request("学习主题不能为空"));
        }
        if request.days_available == 0 || request.days_available > MAX_PLAN_DAYS {
            return Err(AppError::invalid_request(format!(
                "可用天数必须在 1..={} 之间，实际为 {}",
                MAX_PLAN_DAYS, request.days_available
            )));
        }
        let hours = request.hours_per_day;
        if !hours.is_finite() || hours <= 0.0 || hours > 24.0 {
            return Err(AppError::invalid_request(format!(
                "每天学习时长必须在 (0, 24] 小时之间，实际为 {}",
                hours
            )));
        }

        info!(
            "📅 制定学习计划: {} 个主题, {} 天, 每天 {} 小时",
            request.topics.len(),
            request.days_available,
            hours
        );

        let outcome = self
            .complete_with_fallback(&self.providers, |_| {
                CompletionRequest::new(PromptBuilder::study_plan(request))
                    .with_system(STUDY_PLAN_SYSTEM)
                    .with_max_tokens(3000)
                    .with_temperature(0.6)
            })
            .await?;

        Ok(StudyPlanResponse {
            plan: outcome.value.0,
            provider: outcome.provider,
        })
    }

    /// 继续之前的对话
    ///
    /// 最后一条消息必须来自用户
    pub async fn follow_up(&self, request: &FollowUpRequest) -> AppResult<FollowUpResponse> {
        let last = request
            .messages
            .last()
            .ok_or_else(|| AppError::invalid_request("对话消息不能为空"))?;
        if last.role != ChatRole::User || last.content.trim().is_empty() {
            return Err(AppError::invalid_request("最后一条消息必须是非空的用户提问"));
        }

        info!("💬 追问: 共 {} 条历史消息", request.messages.len());

        let system = PromptBuilder::follow_up_system(request.context.as_deref());
        let outcome = self
            .complete_with_fallback(&self.providers, |_| {
                CompletionRequest::from_messages(request.messages.clone())
                    .with_system(system.clone())
                    .with_max_tokens(1500)
                    .with_temperature(0.7)
            })
            .await?;

        Ok(FollowUpResponse {
            response: outcome.value.0,
            provider: outcome.provider,
        })
    }
}
