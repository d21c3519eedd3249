//! 五个操作入口的请求 / 响应结构
//!
//! 全部使用 camelCase 与调用方（移动端）的 JSON 保持一致

use serde::{Deserialize, Serialize};

use crate::models::attachment::ImageAttachment;
use crate::models::provider::ProviderName;
use crate::models::question::{GeneratedQuestion, QuestionType};

/// 摘要详细程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryComplexity {
    /// 简要：要点列表
    #[serde(alias = "simple", alias = "basic")]
    Brief,
    /// 详细：编号列表
    #[default]
    #[serde(alias = "medium", alias = "moderate")]
    Detailed,
    /// 全面：分章节
    #[serde(alias = "advanced", alias = "full")]
    Comprehensive,
}

/// 讲解难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationLevel {
    #[serde(alias = "simple", alias = "basic")]
    Beginner,
    #[default]
    #[serde(alias = "medium")]
    Intermediate,
    #[serde(alias = "expert")]
    Advanced,
}

impl ExplanationLevel {
    pub fn display_name(self) -> &'static str {
        match self {
            ExplanationLevel::Beginner => "初学者",
            ExplanationLevel::Intermediate => "有一定基础的学习者",
            ExplanationLevel::Advanced => "进阶学习者",
        }
    }
}

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "ai", alias = "model")]
    Assistant,
}

/// 对话中的一条消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default)]
    pub complexity: SummaryComplexity,
    /// 固定的要点数量（可选）
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub summary: String,
    pub provider: ProviderName,
    pub vision_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub types: Vec<QuestionType>,
    pub count: usize,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsResponse {
    pub questions: Vec<GeneratedQuestion>,
    pub provider: ProviderName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub concept: String,
    #[serde(default)]
    pub level: ExplanationLevel,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub explanation: String,
    pub provider: ProviderName,
    pub vision_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanRequest {
    pub topics: Vec<String>,
    pub days_available: u32,
    pub hours_per_day: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanResponse {
    pub plan: String,
    pub provider: ProviderName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpResponse {
    pub response: String,
    pub provider: ProviderName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_request_defaults() {
        let req: SummarizeRequest = serde_json::from_str(r#"{"text":"abc"}"#).unwrap();
        assert_eq!(req.complexity, SummaryComplexity::Detailed);
        assert!(req.count.is_none());
        assert!(req.images.is_empty());
    }

    #[test]
    fn test_complexity_aliases() {
        let c: SummaryComplexity = serde_json::from_str("\"simple\"").unwrap();
        assert_eq!(c, SummaryComplexity::Brief);
        let c: SummaryComplexity = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(c, SummaryComplexity::Comprehensive);
    }

    #[test]
    fn test_response_uses_camel_case() {
        let resp = SummarizeResponse {
            summary: "s".into(),
            provider: ProviderName::Gemini,
            vision_used: true,
        };
        let v = serde_json::to_value(resp).unwrap();
        assert_eq!(v["visionUsed"], true);
        assert_eq!(v["provider"], "gemini");
    }
}
