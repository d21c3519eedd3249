//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责 provider 调度和批量出题，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `fallback_executor` - Provider fallback 执行器
//! - 按注册表顺序逐个尝试 provider，第一个成功即返回
//! - 记录每个失败 provider 的原因，全部失败时聚合报错
//! - 致命错误和取消信号立即终止
//!
//! ### `batch_orchestrator` - 批量出题编排器
//! - 计算超量请求数并切分子批次
//! - 并行 / 顺序两种策略
//! - 跨子批次去重，截断到目标数量
//!
//! ## 层次关系
//!
//! ```text
//! workflow::StudyAssistant (五个入口操作)
//!     ↓
//! fallback_executor (处理 Vec<ProviderConfig>)
//!     ↓
//! batch_orchestrator (仅出题：处理子批次)
//!     ↓
//! services (能力层：prompt / normalizer / registry)
//!     ↓
//! infrastructure (基础设施：GenerationBackend)
//! ```

pub mod batch_orchestrator;
pub mod fallback_executor;

pub use batch_orchestrator::{BatchOrchestrator, BatchSettings};
pub use fallback_executor::{FallbackExecutor, FallbackOutcome};
