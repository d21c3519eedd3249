//! 流程层（Workflow Layer）
//!
//! 定义五个入口操作，负责参数校验和调度，不直接接触网络

pub mod study_flow;

pub use study_flow::StudyAssistant;
