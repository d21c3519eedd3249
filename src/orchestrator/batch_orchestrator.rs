//! 批量出题编排器 - 编排层
//!
//! ## 职责
//!
//! 对单个已选定的 provider 完成一次出题：
//!
//! 1. **批次规划**：按超量比例计算请求总数，切分为固定大小的子批次
//! 2. **并行策略**：所有子批次同时请求，全部完成后按批次顺序合并
//! 3. **顺序策略**：一次只请求缺口数量，最多尝试 `retry_attempts` 次
//! 4. **去重截断**：两种策略都跨子批次 / 跨尝试去重，最后截断到目标数量
//!
//! 任何一个并行子批次失败都会让本次编排失败，交给 FallbackExecutor 换下一个 provider。
//! 结果不足目标数量属于软降级，照常返回。

use futures::future::try_join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{BatchStrategy, Config};
use crate::error::{AppError, AppResult, GenerationError};
use crate::infrastructure::CompletionRequest;
use crate::models::{BatchResult, GeneratedQuestion, GenerationRequest};
use crate::services::prompt_builder::QUESTION_SYSTEM;
use crate::services::{Deduplicator, PromptBuilder, ProviderConfig, ResponseNormalizer};
use crate::utils::logging::log_batch_plan;

/// 每次出题请求的基础 token 预算
const BASE_MAX_TOKENS: u32 = 512;
/// 每道题追加的 token 预算
const TOKENS_PER_QUESTION: u32 = 300;
const MAX_TOKENS_CAP: u32 = 8192;
const QUESTION_TEMPERATURE: f32 = 0.8;

/// 批量出题参数
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub strategy: BatchStrategy,
    pub batch_size: usize,
    pub over_fetch_ratio: f64,
    pub retry_attempts: usize,
    /// 单次调用的超时
    pub timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl BatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.batch_strategy,
            batch_size: config.batch_size,
            over_fetch_ratio: config.over_fetch_ratio,
            retry_attempts: config.retry_attempts,
            timeout: config.question_timeout(),
        }
    }
}

/// 批量出题编排器
#[derive(Debug, Clone, Default)]
pub struct BatchOrchestrator {
    settings: BatchSettings,
}

impl BatchOrchestrator {
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// 计算子批次大小
    ///
    /// 请求总数为 `ceil(target * over_fetch_ratio)`，比例小于 1 时按 1 处理
    pub fn plan_batches(&self, target: usize) -> Vec<usize> {
        if target == 0 {
            return Vec::new();
        }
        let ratio = if self.settings.over_fetch_ratio.is_finite() {
            self.settings.over_fetch_ratio.max(1.0)
        } else {
            1.0
        };
        let over_fetch = ((target as f64) * ratio).ceil() as usize;
        let batch_size = self.settings.batch_size.max(1);

        let mut sizes = Vec::with_capacity(over_fetch.div_ceil(batch_size));
        let mut remaining = over_fetch;
        while remaining > 0 {
            let n = remaining.min(batch_size);
            sizes.push(n);
            remaining -= n;
        }
        sizes
    }

    /// 用指定 provider 生成题目
    ///
    /// 返回的题目数量不超过 `target_count`，题干互不重复
    pub async fn generate(
        &self,
        provider: &ProviderConfig,
        request: &GenerationRequest,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        if request.target_count == 0 {
            return Err(AppError::invalid_request("题目数量必须大于 0"));
        }

        let normalizer = ResponseNormalizer::new()?;
        match self.settings.strategy {
            BatchStrategy::Parallel => self.generate_parallel(provider, &normalizer, request).await,
            BatchStrategy::Sequential => self.generate_sequential(provider, &normalizer, request).await,
        }
    }

    async fn generate_parallel(
        &self,
        provider: &ProviderConfig,
        normalizer: &ResponseNormalizer,
        request: &GenerationRequest,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        let target = request.target_count;
        let sizes = self.plan_batches(target);
        log_batch_plan(target, sizes.iter().sum(), &sizes);

        // 只有第一个子批次携带图片
        let batches = sizes.iter().enumerate().map(|(index, &count)| {
            self.request_batch(provider, normalizer, request, count, index == 0 && request.has_images(), index)
        });
        let mut results = try_join_all(batches).await?;
        results.sort_by_key(|r| r.source_batch_index);

        let mut dedup = Deduplicator::new();
        let mut accepted: Vec<GeneratedQuestion> = Vec::new();
        for batch in results {
            let duplicates = dedup.merge_into(&mut accepted, batch.questions);
            if duplicates > 0 {
                debug!("子批次 {} 去掉 {} 道重复题目", batch.source_batch_index + 1, duplicates);
            }
        }

        self.finish(provider, accepted, target, sizes.len())
    }

    async fn generate_sequential(
        &self,
        provider: &ProviderConfig,
        normalizer: &ResponseNormalizer,
        request: &GenerationRequest,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        let target = request.target_count;
        let max_attempts = self.settings.retry_attempts.max(1);
        let mut dedup = Deduplicator::new();
        let mut accepted: Vec<GeneratedQuestion> = Vec::new();
        let mut attempts = 0;

        while attempts < max_attempts && accepted.len() < target {
            let shortfall = target - accepted.len();
            attempts += 1;
            info!(
                "🔄 [{}] 第 {}/{} 次请求，还差 {} 道",
                provider.name, attempts, max_attempts, shortfall
            );

            match self
                .request_batch(provider, normalizer, request, shortfall, request.has_images(), attempts - 1)
                .await
            {
                Ok(batch) => {
                    let duplicates = dedup.merge_into(&mut accepted, batch.questions);
                    if duplicates > 0 {
                        debug!("第 {} 次请求去掉 {} 道重复题目", attempts, duplicates);
                    }
                }
                Err(AppError::Generation(GenerationError::MalformedResponse { reason, .. })) => {
                    warn!("[{}] ⚠️ 第 {} 次响应无法解析: {}", provider.name, attempts, reason);
                }
                Err(e) => return Err(e),
            }
        }

        self.finish(provider, accepted, target, attempts)
    }

    /// 请求一个子批次并规范化结果
    async fn request_batch(
        &self,
        provider: &ProviderConfig,
        normalizer: &ResponseNormalizer,
        request: &GenerationRequest,
        count: usize,
        with_images: bool,
        index: usize,
    ) -> AppResult<BatchResult> {
        let prompt = PromptBuilder::questions(request, count, with_images);
        let mut completion = CompletionRequest::new(prompt)
            .with_system(QUESTION_SYSTEM)
            .with_max_tokens(token_budget(count))
            .with_temperature(QUESTION_TEMPERATURE);
        if with_images {
            completion = completion.with_images(request.images.clone());
        }

        debug!("[{}] 子批次 {} 请求 {} 道题", provider.name, index + 1, count);
        let raw = provider.complete_text(completion, self.settings.timeout).await?;
        let questions = normalizer.parse_and_normalize(&raw, &request.question_types)?;
        debug!(
            "[{}] 子批次 {} 得到 {}/{} 道有效题目",
            provider.name,
            index + 1,
            questions.len(),
            count
        );

        Ok(BatchResult {
            questions,
            source_batch_index: index,
        })
    }

    fn finish(
        &self,
        provider: &ProviderConfig,
        mut accepted: Vec<GeneratedQuestion>,
        target: usize,
        attempts: usize,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        if accepted.is_empty() {
            return Err(GenerationError::ValidationExhausted {
                requested: target,
                produced: 0,
                attempts,
            }
            .into());
        }

        if accepted.len() < target {
            warn!(
                "[{}] ⚠️ 去重后只有 {}/{} 道题目，返回不足量结果",
                provider.name,
                accepted.len(),
                target
            );
        } else {
            accepted.truncate(target);
            info!("✓ [{}] 生成 {} 道题目", provider.name, target);
        }
        Ok(accepted)
    }
}

fn token_budget(count: usize) -> u32 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    BASE_MAX_TOKENS
        .saturating_add(TOKENS_PER_QUESTION.saturating_mul(count))
        .min(MAX_TOKENS_CAP)
}
