//! OpenAI 兼容后端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - OpenAI 本身以及 Groq 这类兼容 OpenAI API 的服务都走这里

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ApiCredential;
use crate::error::{AppError, AppResult, LlmError};
use crate::infrastructure::backend::{CompletionRequest, GenerationBackend};
use crate::models::{ChatRole, ProviderName};

/// OpenAI 兼容的 chat-completion 后端
pub struct OpenAiBackend {
    provider: ProviderName,
    client: Client<OpenAIConfig>,
    model_name: String,
    vision: bool,
}

impl OpenAiBackend {
    pub fn new(provider: ProviderName, credential: &ApiCredential, vision: bool) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&credential.api_key)
            .with_api_base(&credential.base_url);

        Self {
            provider,
            client: Client::with_config(openai_config),
            model_name: credential.model.clone(),
            vision,
        }
    }

    fn build_error(&self, e: impl std::fmt::Display) -> AppError {
        AppError::Llm(LlmError::RequestBuildFailed {
            provider: self.provider,
            reason: e.to_string(),
        })
    }

    /// 把 CompletionRequest 转成 chat-completion 请求
    ///
    /// 图片以 base64 data URL 的形式附加在最后一条用户消息上
    fn build_request(&self, request: &CompletionRequest) -> AppResult<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = &request.system {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg.as_str())
                .build()
                .map_err(|e| self.build_error(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let image_target = if self.vision && !request.images.is_empty() {
            request.last_user_index()
        } else {
            None
        };

        for (idx, turn) in request.messages.iter().enumerate() {
            match turn.role {
                ChatRole::Assistant => {
                    let msg = ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.as_str())
                        .build()
                        .map_err(|e| self.build_error(e))?;
                    messages.push(ChatCompletionRequestMessage::Assistant(msg));
                }
                ChatRole::User if Some(idx) == image_target => {
                    let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> =
                        vec![ChatCompletionRequestUserMessageContentPart::Text(
                            ChatCompletionRequestMessageContentPartText {
                                text: turn.content.clone(),
                            },
                        )];

                    for image in &request.images {
                        content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                            ChatCompletionRequestMessageContentPartImage {
                                image_url: ImageUrl {
                                    url: image.data_url(),
                                    detail: Some(ImageDetail::Auto),
                                },
                            },
                        ));
                    }

                    debug!("使用 Vision API，包含 {} 张图片", request.images.len());

                    let msg = ChatCompletionRequestUserMessageArgs::default()
                        .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                        .build()
                        .map_err(|e| self.build_error(e))?;
                    messages.push(ChatCompletionRequestMessage::User(msg));
                }
                ChatRole::User => {
                    let msg = ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.as_str())
                        .build()
                        .map_err(|e| self.build_error(e))?;
                    messages.push(ChatCompletionRequestMessage::User(msg));
                }
            }
        }

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| self.build_error(e))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> ProviderName {
        self.provider
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn complete_text(&self, request: &CompletionRequest) -> AppResult<String> {
        debug!("[{}] 调用 LLM API，模型: {}", self.provider, self.model_name);

        let chat_request = self.build_request(request)?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("[{}] LLM API 调用失败: {}", self.provider, e);
            AppError::llm_api_failed(self.provider, e)
        })?;

        debug!("[{}] LLM API 调用成功", self.provider);

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(AppError::Llm(LlmError::EmptyContent {
                provider: self.provider,
            }))
    }
}
