//! # Study Assistant AI
//!
//! 学习助手的 AI 生成核心：摘要、出题、概念讲解、学习计划、追问对话
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有网络客户端，只暴露"补全文本"能力
//! - `GenerationBackend` - 后端 trait（OpenAI / Gemini / Groq）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不做调度
//! - `ProviderRegistry` - 根据凭据解析有序的 provider 列表
//! - `PromptBuilder` - 构建各操作的提示词
//! - `ResponseNormalizer` - 解析、修正、去重后端返回的题目
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/fallback_executor` - 按顺序尝试 provider，第一个成功即返回
//! - `orchestrator/batch_orchestrator` - 超量请求、合并去重、截断
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 五个入口操作：校验参数 → fallback → 返回结果
//!
//! ### ⑤ 接口层（API）
//! - `api/` - JSON 请求 / 响应边界
//!
//! ## 模块结构

pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::handle_json;
pub use config::{ApiCredential, BatchStrategy, Config, Credentials};
pub use error::{AppError, AppResult};
pub use infrastructure::{CompletionRequest, GenerationBackend};
pub use models::{GeneratedQuestion, ImageAttachment, ProviderName, QuestionType};
pub use orchestrator::{BatchOrchestrator, FallbackExecutor};
pub use services::{ProviderConfig, ProviderRegistry};
pub use workflow::StudyAssistant;
