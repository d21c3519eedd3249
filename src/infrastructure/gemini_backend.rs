//! Gemini 原生后端
//!
//! Gemini 的 `generateContent` 接口与 chat-completion 形状不同，
//! 这里直接用 reqwest 拼请求体

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ApiCredential;
use crate::error::{AppError, AppResult, LlmError};
use crate::infrastructure::backend::{CompletionRequest, GenerationBackend};
use crate::models::{ChatRole, ProviderName};
use crate::utils::logging::truncate_text;

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Gemini 后端
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model_name: String,
}

impl GeminiBackend {
    pub fn new(credential: &ApiCredential) -> Self {
        Self {
            client: Client::new(),
            api_key: credential.api_key.clone(),
            base_url: credential.base_url.trim_end_matches('/').to_string(),
            model_name: credential.model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_name)
    }

    fn build_request(request: &CompletionRequest) -> GeminiRequest {
        let image_target = request.last_user_index();

        let contents = request
            .messages
            .iter()
            .enumerate()
            .map(|(idx, turn)| {
                let role = match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                };
                let mut parts = vec![GeminiPart {
                    text: Some(turn.content.clone()),
                    inline_data: None,
                }];
                if Some(idx) == image_target {
                    parts.extend(request.images.iter().map(|image| GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.base64_payload().to_string(),
                        }),
                    }));
                }
                GeminiContent {
                    role: Some(role.to_string()),
                    parts,
                }
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(s.clone()),
                    inline_data: None,
                }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    /// 拼接第一个候选的所有文本片段
    fn extract_text(response: GeminiResponse) -> Option<String> {
        let content = response.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> ProviderName {
        ProviderName::Gemini
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn complete_text(&self, request: &CompletionRequest) -> AppResult<String> {
        debug!("[gemini] 调用 generateContent，模型: {}", self.model_name);

        let body = Self::build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("[gemini] 请求发送失败: {}", e);
                AppError::llm_api_failed(ProviderName::Gemini, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("[gemini] API 返回错误 {}: {}", status, truncate_text(&error_text, 200));
            return Err(AppError::llm_api_failed(
                ProviderName::Gemini,
                format!("HTTP {}: {}", status, truncate_text(&error_text, 200)),
            ));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::llm_api_failed(ProviderName::Gemini, e))?;

        Self::extract_text(parsed).ok_or(AppError::Llm(LlmError::EmptyContent {
            provider: ProviderName::Gemini,
        }))
    }
}
