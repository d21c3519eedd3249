use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::models::attachment::ImageAttachment;

/// 判断题固定的两个选项（本地化），第一个表示"对"
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["正确", "错误"];

/// 选择题固定的选项数量
pub const MULTIPLE_CHOICE_OPTION_COUNT: usize = 4;

/// 题型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    /// 选择题：恰好 4 个选项
    #[serde(alias = "multiple_choice")]
    MultipleChoice,
    /// 判断题：固定两个选项
    #[serde(alias = "true_false")]
    TrueFalse,
    /// 简答题：无选项
    #[serde(alias = "short_answer")]
    ShortAnswer,
}

impl QuestionType {
    /// JSON 中使用的标准名称
    pub fn name(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multipleChoice",
            QuestionType::TrueFalse => "trueFalse",
            QuestionType::ShortAnswer => "shortAnswer",
        }
    }

    /// 中文显示名称
    pub fn display_name(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "选择题",
            QuestionType::TrueFalse => "判断题",
            QuestionType::ShortAnswer => "简答题",
        }
    }

    /// 宽松解析 LLM 返回的题型字符串
    ///
    /// 支持 camelCase / snake_case / 缩写 / 中文名
    pub fn parse_lenient(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        match key.as_str() {
            "multiplechoice" | "mcq" | "mc" | "choice" | "singlechoice" | "选择题" | "单选题"
            | "选择" => Some(QuestionType::MultipleChoice),
            "truefalse" | "tf" | "boolean" | "bool" | "判断题" | "判断" => {
                Some(QuestionType::TrueFalse)
            }
            "shortanswer" | "short" | "openended" | "open" | "简答题" | "问答题" | "简答" => {
                Some(QuestionType::ShortAnswer)
            }
            _ => None,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 规范化之后的题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

/// LLM 返回的原始题目
///
/// 字段名、类型都不可信，所以尽量宽松地接收
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuestion {
    #[serde(default, alias = "questionText", alias = "question_text", alias = "text", alias = "stem")]
    pub question: Option<String>,
    #[serde(default, alias = "choices")]
    pub options: Option<JsonValue>,
    #[serde(default, alias = "correctAnswer", alias = "correct_answer", alias = "correct")]
    pub answer: Option<JsonValue>,
    #[serde(default, alias = "rationale")]
    pub explanation: Option<String>,
    #[serde(default, rename = "type", alias = "questionType", alias = "question_type")]
    pub question_type: Option<String>,
}

/// 题目生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_text: String,
    pub images: Vec<ImageAttachment>,
    /// 非空、去重、保持调用方给出的顺序
    pub question_types: Vec<QuestionType>,
    pub target_count: usize,
}

impl GenerationRequest {
    /// 创建请求，空题型列表默认为选择题
    pub fn new(
        source_text: impl Into<String>,
        question_types: &[QuestionType],
        target_count: usize,
    ) -> Self {
        let mut types: Vec<QuestionType> = Vec::new();
        for t in question_types {
            if !types.contains(t) {
                types.push(*t);
            }
        }
        if types.is_empty() {
            types.push(QuestionType::MultipleChoice);
        }

        Self {
            source_text: source_text.into(),
            images: Vec::new(),
            question_types: types,
            target_count,
        }
    }

    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

/// 单个子批次的结果，合并去重后即丢弃
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub questions: Vec<GeneratedQuestion>,
    pub source_batch_index: usize,
}

/// 按题型平均分配题目数量
///
/// 余数依次分给排在前面的题型
pub fn distribute_counts(total: usize, types: &[QuestionType]) -> Vec<(QuestionType, usize)> {
    if types.is_empty() {
        return Vec::new();
    }
    let base = total / types.len();
    let remainder = total % types.len();
    types
        .iter()
        .enumerate()
        .map(|(i, t)| (*t, base + usize::from(i < remainder)))
        .collect()
}
