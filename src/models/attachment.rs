use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// 图片附件
///
/// 以 base64 形式保存，发送时编码为 data URL（OpenAI）或 inline_data（Gemini）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    /// MIME 类型，例如 image/png
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// base64 编码后的图片内容
    pub data: String,
}

fn default_mime_type() -> String {
    "image/jpeg".to_string()
}

impl ImageAttachment {
    /// 从原始字节创建附件
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// 编码为 data URL
    ///
    /// 若 data 本身已经是 data URL 则原样返回
    pub fn data_url(&self) -> String {
        if self.data.starts_with("data:") {
            return self.data.clone();
        }
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// 纯 base64 内容（去掉可能存在的 data URL 前缀）
    pub fn base64_payload(&self) -> &str {
        match self.data.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => &self.data,
        }
    }
}
