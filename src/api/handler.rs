//! JSON 请求处理
//!
//! 请求格式：`{ "operation": "summarize" | "generateQuestions" | "explain" | "createStudyPlan" | "followUp", ...参数 }`
//!
//! 成功返回对应操作的响应 JSON，任何错误都返回 `{ "error": "..." }`

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::models::{
    ExplainRequest, FollowUpRequest, GenerateQuestionsRequest, StudyPlanRequest, SummarizeRequest,
};
use crate::workflow::StudyAssistant;

/// 带操作名的请求
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum OperationRequest {
    Summarize(SummarizeRequest),
    GenerateQuestions(GenerateQuestionsRequest),
    Explain(ExplainRequest),
    CreateStudyPlan(StudyPlanRequest),
    FollowUp(FollowUpRequest),
}

impl OperationRequest {
    pub fn name(&self) -> &'static str {
        match self {
            OperationRequest::Summarize(_) => "summarize",
            OperationRequest::GenerateQuestions(_) => "generateQuestions",
            OperationRequest::Explain(_) => "explain",
            OperationRequest::CreateStudyPlan(_) => "createStudyPlan",
            OperationRequest::FollowUp(_) => "followUp",
        }
    }
}

/// 解析请求 JSON
pub fn parse_request(body: &str) -> AppResult<OperationRequest> {
    serde_json::from_str(body).map_err(|e| AppError::invalid_request(format!("无法解析请求: {}", e)))
}

/// 执行一个操作，返回响应 JSON
pub async fn dispatch(assistant: &StudyAssistant, request: OperationRequest) -> AppResult<JsonValue> {
    let value = match request {
        OperationRequest::Summarize(req) => serde_json::to_value(assistant.summarize(&req).await?)?,
        OperationRequest::GenerateQuestions(req) => {
            serde_json::to_value(assistant.generate_questions(&req).await?)?
        }
        OperationRequest::Explain(req) => serde_json::to_value(assistant.explain(&req).await?)?,
        OperationRequest::CreateStudyPlan(req) => {
            serde_json::to_value(assistant.create_study_plan(&req).await?)?
        }
        OperationRequest::FollowUp(req) => serde_json::to_value(assistant.follow_up(&req).await?)?,
    };
    Ok(value)
}

/// 处理一个 JSON 请求，始终返回 JSON 字符串
pub async fn handle_json(assistant: &StudyAssistant, body: &str) -> String {
    let result = match parse_request(body) {
        Ok(request) => {
            let operation = request.name();
            info!("📨 收到请求: {}", operation);
            dispatch(assistant, request).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => value.to_string(),
        Err(e) => {
            error!("❌ 请求失败: {}", e);
            error_body(&e)
        }
    }
}

fn error_body(err: &AppError) -> String {
    json!({ "error": err.to_string() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::ProviderName;
    use crate::services::provider_registry::testing::ScriptedBackend;
    use crate::services::ProviderConfig;
    use std::sync::Arc;

    fn assistant(responses: Vec<AppResult<String>>) -> StudyAssistant {
        let backend = Arc::new(ScriptedBackend::new(ProviderName::Gemini, responses));
        StudyAssistant::with_providers(&Config::default(), vec![ProviderConfig::new(backend)])
    }

    #[test]
    fn test_parse_tagged_operations() {
        let request = parse_request(
            r#"{"operation": "createStudyPlan", "topics": ["概率"], "daysAvailable": 5, "hoursPerDay": 2}"#,
        )
        .unwrap();
        assert_eq!(request.name(), "createStudyPlan");

        let request = parse_request(r#"{"operation": "generateQuestions", "text": "t", "count": 3, "types": ["trueFalse"]}"#)
            .unwrap();
        match request {
            OperationRequest::GenerateQuestions(req) => assert_eq!(req.count, 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operation_is_invalid_request() {
        let err = parse_request(r#"{"operation": "translate", "text": "hi"}"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_handle_json_success() {
        let assistant = assistant(vec![Ok("这是讲解".into())]);
        let body = handle_json(&assistant, r#"{"operation": "explain", "concept": "极限", "level": "beginner"}"#).await;
        let value: JsonValue = serde_json::from_str(&body).unwrap();
        assert_eq!(value["explanation"], "这是讲解");
        assert_eq!(value["provider"], "gemini");
        assert_eq!(value["visionUsed"], false);
    }

    #[tokio::test]
    async fn test_handle_json_error_shape() {
        let assistant = assistant(vec![]);
        let body = handle_json(&assistant, "not json").await;
        let value: JsonValue = serde_json::from_str(&body).unwrap();
        assert!(value["error"].as_str().unwrap().contains("无法解析请求"));

        let body = handle_json(&assistant, r#"{"operation": "followUp", "messages": []}"#).await;
        let value: JsonValue = serde_json::from_str(&body).unwrap();
        assert!(value["error"].is_string());
    }
}
