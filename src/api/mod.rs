//! API 模块
//!
//! 负责与调用方（移动端 / 命令行）的 JSON 交互

pub mod handler;

pub use handler::{dispatch, handle_json, parse_request, OperationRequest};
