//! 响应解析与规范化 - 业务能力层
//!
//! 后端不一定遵守提示词：可能包裹在 markdown 代码块或说明文字里，
//! 可能给错选项数量、用字母代替答案。这里负责：
//! 1. 从原始文本中找出 JSON 数组（找不到即 MalformedResponse）
//! 2. 按题型强制修正 options / correctAnswer
//! 3. 提供去重用的 key

use phf::phf_map;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::question::{MULTIPLE_CHOICE_OPTION_COUNT, TRUE_FALSE_OPTIONS};
use crate::models::{GeneratedQuestion, QuestionType, RawQuestion};

/// 判断题答案同义词：true 映射到第一个选项，false 映射到第二个
static TRUE_FALSE_SYNONYMS: phf::Map<&'static str, bool> = phf_map! {
    "true" => true,
    "t" => true,
    "a" => true,
    "yes" => true,
    "y" => true,
    "correct" => true,
    "right" => true,
    "1" => true,
    "对" => true,
    "正确" => true,
    "是" => true,
    "√" => true,
    "✓" => true,
    "verdadero" => true,
    "vrai" => true,
    "false" => false,
    "f" => false,
    "b" => false,
    "no" => false,
    "n" => false,
    "incorrect" => false,
    "wrong" => false,
    "0" => false,
    "错" => false,
    "错误" => false,
    "否" => false,
    "不对" => false,
    "×" => false,
    "✗" => false,
    "falso" => false,
    "faux" => false,
};

const FENCE_PATTERN: &str = r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?|\r?\n?```\s*$";
const LABEL_PATTERN: &str = r"^\s*\(?([A-Ha-h])[\)\.．、:：]\s*";

/// 响应规范化器
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    fence: Regex,
    label: Regex,
}

impl ResponseNormalizer {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            fence: Regex::new(FENCE_PATTERN)?,
            label: Regex::new(LABEL_PATTERN)?,
        })
    }

    /// 解析原始响应为题目列表
    ///
    /// 数组中无法识别的元素会被跳过；找不到数组则返回 MalformedResponse
    pub fn parse(&self, raw_text: &str) -> AppResult<Vec<RawQuestion>> {
        let stripped = self.strip_code_fences(raw_text);
        let items = find_json_array(stripped)
            .ok_or_else(|| AppError::malformed_response("响应中没有找到 JSON 数组", raw_text))?;

        let total = items.len();
        let questions: Vec<RawQuestion> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RawQuestion>(item) {
                Ok(q) => Some(q),
                Err(e) => {
                    debug!("跳过无法识别的题目元素: {}", e);
                    None
                }
            })
            .collect();

        debug!("解析到 {}/{} 个题目对象", questions.len(), total);
        Ok(questions)
    }

    /// 按题型规则规范化单个题目
    ///
    /// 无法满足题型约束时返回 None（不会编造缺失的内容）
    pub fn normalize(&self, raw: &RawQuestion, allowed: &[QuestionType]) -> Option<GeneratedQuestion> {
        let question_text = raw.question.as_deref().map(str::trim).unwrap_or_default();
        if question_text.is_empty() {
            return None;
        }

        let options = raw.options.as_ref().map(options_from_value).unwrap_or_default();
        let answer = raw.answer.as_ref();
        let question_type = resolve_type(raw, &options, allowed);

        let (options, correct_answer) = match question_type {
            QuestionType::MultipleChoice => normalize_multiple_choice(&self.label, options, answer)?,
            QuestionType::TrueFalse => normalize_true_false(&options, answer)?,
            QuestionType::ShortAnswer => {
                let answer = answer.map(answer_text).unwrap_or_default();
                if answer.trim().is_empty() {
                    return None;
                }
                (Vec::new(), answer.trim().to_string())
            }
        };

        Some(GeneratedQuestion {
            question_text: question_text.to_string(),
            options,
            correct_answer,
            explanation: raw.explanation.as_deref().unwrap_or_default().trim().to_string(),
            question_type,
        })
    }

    /// 解析并规范化，丢弃不合格的题目
    pub fn parse_and_normalize(&self, raw_text: &str, allowed: &[QuestionType]) -> AppResult<Vec<GeneratedQuestion>> {
        let raws = self.parse(raw_text)?;
        let total = raws.len();
        let questions: Vec<GeneratedQuestion> = raws
            .iter()
            .filter_map(|raw| self.normalize(raw, allowed))
            .collect();

        if questions.len() < total {
            warn!("⚠️ 丢弃了 {} 道不符合题型约束的题目", total - questions.len());
        }
        Ok(questions)
    }

    /// 去掉首尾的 markdown 代码块标记
    fn strip_code_fences<'a>(&self, raw: &'a str) -> &'a str {
        let trimmed = raw.trim();
        let mut start = 0;
        let mut end = trimmed.len();
        for m in self.fence.find_iter(trimmed) {
            if m.start() == 0 {
                start = m.end();
            } else if m.end() == trimmed.len() {
                end = m.start();
            }
        }
        if start >= end {
            return "";
        }
        trimmed[start..end].trim()
    }
}

/// 依次尝试每个 `[`，返回第一个能解析为对象数组的平衡子串
///
/// 空数组只在它是第一个 `[` 时才接受；外层数组被截断时，
/// 内层的 options 之类的数组不会被误当作结果
fn find_json_array(text: &str) -> Option<Vec<JsonValue>> {
    for (n, (start, _)) in text.match_indices('[').enumerate() {
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        if let Ok(items) = serde_json::from_str::<Vec<JsonValue>>(&text[start..start + end]) {
            if items.iter().any(JsonValue::is_object) || (items.is_empty() && n == 0) {
                return Some(items);
            }
        }
    }
    None
}

/// 返回与开头 `[` 匹配的 `]` 之后的字节位置，会跳过字符串中的括号
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// 去重 key：小写 + 合并空白
pub fn dedup_key(question_text: &str) -> String {
    question_text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 跨批次 / 跨尝试的去重器，先到先得
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 若题目未出现过则记录并返回 true
    pub fn insert(&mut self, question: &GeneratedQuestion) -> bool {
        self.seen.insert(dedup_key(&question.question_text))
    }

    /// 把 `incoming` 中的新题追加到 `accepted`，返回被丢弃的重复数
    pub fn merge_into(
        &mut self,
        accepted: &mut Vec<GeneratedQuestion>,
        incoming: Vec<GeneratedQuestion>,
    ) -> usize {
        let mut duplicates = 0;
        for question in incoming {
            if self.insert(&question) {
                accepted.push(question);
            } else {
                duplicates += 1;
            }
        }
        duplicates
    }
}

fn options_from_value(value: &JsonValue) -> Vec<String> {
    let items: Vec<String> = match value {
        JsonValue::Array(items) => items.iter().filter_map(scalar_or_text).collect(),
        // {"A": "...", "B": "..."}：serde_json 的 Map 按 key 排序
        JsonValue::Object(map) => map.values().filter_map(scalar_or_text).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn scalar_or_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Object(map) => ["text", "option", "label", "value"]
            .iter()
            .find_map(|k| map.get(*k).and_then(JsonValue::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn answer_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Array(items) => items.first().map(answer_text).unwrap_or_default(),
        other => scalar_or_text(other).unwrap_or_default(),
    }
}

/// 题型：优先用声明的题型，其次按形状推断，都不在允许范围内则取第一个允许的题型
fn resolve_type(raw: &RawQuestion, options: &[String], allowed: &[QuestionType]) -> QuestionType {
    let fallback = allowed.first().copied().unwrap_or(QuestionType::MultipleChoice);

    if let Some(declared) = raw
        .question_type
        .as_deref()
        .and_then(QuestionType::parse_lenient)
        .filter(|t| allowed.contains(t))
    {
        return declared;
    }
    if allowed.len() == 1 {
        return fallback;
    }

    let looks_true_false = matches!(raw.answer, Some(JsonValue::Bool(_)))
        || (options.len() == 2 && options.iter().all(|o| true_false_value(o).is_some()));
    let inferred = if looks_true_false {
        QuestionType::TrueFalse
    } else if options.is_empty() {
        QuestionType::ShortAnswer
    } else {
        QuestionType::MultipleChoice
    };

    if allowed.contains(&inferred) {
        inferred
    } else {
        fallback
    }
}

fn strip_label(label: &Regex, option: &str) -> String {
    label.replace(option, "").trim().to_string()
}

fn letter_index(answer: &str) -> Option<usize> {
    let trimmed = answer.trim().trim_matches(|c: char| "()（）.．、:：".contains(c));
    let mut chars = trimmed.chars();
    let letter = chars.next()?;
    if chars.next().is_some() || !letter.is_ascii_alphabetic() {
        return None;
    }
    Some((letter.to_ascii_uppercase() as u8 - b'A') as usize)
}

fn normalize_multiple_choice(
    label: &Regex,
    options: Vec<String>,
    answer: Option<&JsonValue>,
) -> Option<(Vec<String>, String)> {
    // 只有所有选项都带标号时才去掉标号，避免误伤正常文本
    let all_labelled = !options.is_empty() && options.iter().all(|o| label.is_match(o));
    let cleaned: Vec<String> = if all_labelled {
        options.iter().map(|o| strip_label(label, o)).collect()
    } else {
        options
    };

    let mut unique: Vec<String> = Vec::new();
    for option in cleaned {
        if !option.is_empty() && !unique.iter().any(|u| u.to_lowercase() == option.to_lowercase()) {
            unique.push(option);
        }
    }
    if unique.len() < MULTIPLE_CHOICE_OPTION_COUNT {
        return None;
    }

    let answer_value = answer?;
    let correct_index = match answer_value {
        JsonValue::Number(n) => n.as_u64().map(|i| i as usize).filter(|i| *i < unique.len()),
        other => {
            let text = answer_text(other);
            let text = text.trim();
            let lowered = text.to_lowercase();
            let unlabelled = strip_label(label, text).to_lowercase();
            unique
                .iter()
                .position(|o| o == text)
                .or_else(|| unique.iter().position(|o| o.to_lowercase() == lowered))
                .or_else(|| unique.iter().position(|o| o.to_lowercase() == unlabelled))
                .or_else(|| letter_index(text).filter(|i| *i < unique.len()))
        }
    }?;

    let correct = unique[correct_index].clone();
    let mut options: Vec<String> = unique.into_iter().take(MULTIPLE_CHOICE_OPTION_COUNT).collect();
    if correct_index >= MULTIPLE_CHOICE_OPTION_COUNT {
        options[MULTIPLE_CHOICE_OPTION_COUNT - 1] = correct.clone();
    }
    Some((options, correct))
}

fn true_false_value(text: &str) -> Option<bool> {
    let key = text
        .trim()
        .trim_end_matches(|c: char| "。.!！".contains(c))
        .to_lowercase();
    if key == TRUE_FALSE_OPTIONS[0] {
        return Some(true);
    }
    if key == TRUE_FALSE_OPTIONS[1] {
        return Some(false);
    }
    TRUE_FALSE_SYNONYMS.get(key.as_str()).copied()
}

fn normalize_true_false(options: &[String], answer: Option<&JsonValue>) -> Option<(Vec<String>, String)> {
    let value = match answer? {
        JsonValue::Bool(b) => Some(*b),
        other => {
            let text = answer_text(other);
            // 同义词无法识别时，才按后端自己的两个选项的位置对应
            true_false_value(&text).or_else(|| {
                options
                    .iter()
                    .position(|o| o.trim().eq_ignore_ascii_case(text.trim()))
                    .filter(|_| options.len() == 2)
                    .map(|i| i == 0)
            })
        }
    }?;

    let fixed: Vec<String> = TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect();
    let correct = if value { TRUE_FALSE_OPTIONS[0] } else { TRUE_FALSE_OPTIONS[1] };
    Some((fixed, correct.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [QuestionType; 3] = [
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::ShortAnswer,
    ];

    fn normalizer() -> ResponseNormalizer {
        ResponseNormalizer::new().unwrap()
    }

    fn raw(value: JsonValue) -> RawQuestion {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_fenced_and_bare_arrays_parse_identically() {
        let bare = r#"[{"questionText":"Q1","options":[],"correctAnswer":"A1","type":"shortAnswer"}]"#;
        let fenced = format!("```json\n{}\n```", bare);
        let plain_fence = format!("```\n{}\n```", bare);

        let a = normalizer().parse_and_normalize(bare, &ALL).unwrap();
        let b = normalizer().parse_and_normalize(&fenced, &ALL).unwrap();
        let c = normalizer().parse_and_normalize(&plain_fence, &ALL).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_array_inside_prose_and_wrapper_object() {
        let text = r#"好的，这是你要的 [3] 道题：{"questions": [{"question":"Q","answer":"x","type":"shortAnswer"}]} 祝学习愉快"#;
        let parsed = normalizer().parse(text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].question.as_deref(), Some("Q"));
    }

    #[test]
    fn test_brackets_inside_strings_do_not_break_scan() {
        let text = r#"[{"questionText":"数组 a[0] 的值是?]","correctAnswer":"1","type":"shortAnswer"}]"#;
        let parsed = normalizer().parse(text).unwrap();
        assert_eq!(parsed[0].question.as_deref(), Some("数组 a[0] 的值是?]"));
    }

    #[test]
    fn test_missing_array_is_malformed() {
        let err = normalizer().parse("抱歉，我无法生成题目。").unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(crate::error::GenerationError::MalformedResponse { .. })
        ));
        // 被截断的数组同样视为格式错误
        assert!(normalizer().parse(r#"[{"questionText":"Q""#).is_err());
    }

    #[test]
    fn test_truncated_array_with_inner_options_is_malformed() {
        let text = r#"[{"questionText":"Q1","options":["a","b","c","d"],"correctAnswer":"a","type":"multipleChoice"},{"questionText":"Q2","options":["a","b"#;
        let err = normalizer().parse(text).unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(crate::error::GenerationError::MalformedResponse { .. })
        ));

        let text = r#"[{"questionText":"Q1","options":[],"correctAnswer":"x","type":"shortAnswer"},{"questionText":"Q2""#;
        assert!(normalizer().parse(text).is_err());
    }

    #[test]
    fn test_empty_array_is_valid_empty_result() {
        assert!(normalizer().parse("```json\n[]\n```").unwrap().is_empty());
    }

    #[test]
    fn test_true_false_coerced_to_fixed_pair() {
        let cases = [
            (json!("True"), "正确"),
            (json!("A"), "正确"),
            (json!(true), "正确"),
            (json!("yes"), "正确"),
            (json!("Falso"), "错误"),
            (json!("b"), "错误"),
            (json!(false), "错误"),
            (json!("错"), "错误"),
        ];
        for (answer, expected) in cases {
            let q = normalizer().normalize(
                &raw(json!({"questionText":"地球是圆的","options":["True","False"],"correctAnswer":answer,"type":"trueFalse"})),
                &ALL,
            )
            .unwrap();
            assert_eq!(q.options, vec!["正确", "错误"]);
            assert_eq!(q.correct_answer, expected);
        }
    }

    #[test]
    fn test_true_false_answer_matching_backend_option_by_position() {
        let q = normalizer().normalize(
            &raw(json!({"questionText":"Q","options":["Doğru","Yanlış"],"correctAnswer":"Yanlış","type":"tf"})),
            &[QuestionType::TrueFalse],
        )
        .unwrap();
        assert_eq!(q.correct_answer, "错误");
    }

    #[test]
    fn test_true_false_reversed_backend_options_keep_meaning() {
        let cases = [
            (json!(["错误", "正确"]), "正确", "正确"),
            (json!(["False", "True"]), "True", "正确"),
            (json!(["False", "True"]), "False", "错误"),
        ];
        for (options, answer, expected) in cases {
            let q = normalizer()
                .normalize(
                    &raw(json!({"questionText":"Q","options":options,"correctAnswer":answer,"type":"trueFalse"})),
                    &ALL,
                )
                .unwrap();
            assert_eq!(q.options, vec!["正确", "错误"]);
            assert_eq!(q.correct_answer, expected);
        }
    }

    #[test]
    fn test_true_false_unmappable_answer_dropped() {
        let q = normalizer().normalize(
            &raw(json!({"questionText":"Q","correctAnswer":"maybe","type":"trueFalse"})),
            &ALL,
        );
        assert!(q.is_none());
    }

    #[test]
    fn test_multiple_choice_letter_answer_and_labels() {
        let q = normalizer().normalize(
            &raw(json!({
                "questionText": "水的化学式是？",
                "options": ["A. H2O", "B. CO2", "C. O2", "D. NaCl"],
                "correctAnswer": "A",
                "type": "multipleChoice"
            })),
            &ALL,
        )
        .unwrap();
        assert_eq!(q.options, vec!["H2O", "CO2", "O2", "NaCl"]);
        assert_eq!(q.correct_answer, "H2O");
    }

    #[test]
    fn test_multiple_choice_labelled_answer_and_object_options() {
        let q = normalizer().normalize(
            &raw(json!({
                "question": "Q",
                "options": {"A": "one", "B": "two", "C": "three", "D": "four"},
                "answer": "C) three"
            })),
            &[QuestionType::MultipleChoice],
        )
        .unwrap();
        assert_eq!(q.options, vec!["one", "two", "three", "four"]);
        assert_eq!(q.correct_answer, "three");
    }

    #[test]
    fn test_multiple_choice_surplus_options_keep_correct() {
        let q = normalizer().normalize(
            &raw(json!({
                "questionText": "Q",
                "options": ["a", "b", "c", "d", "e", "f"],
                "correctAnswer": "f",
                "type": "multipleChoice"
            })),
            &ALL,
        )
        .unwrap();
        assert_eq!(q.options.len(), 4);
        assert!(q.options.contains(&q.correct_answer));
        assert_eq!(q.correct_answer, "f");
    }

    #[test]
    fn test_multiple_choice_numeric_index_answer() {
        let q = normalizer().normalize(
            &raw(json!({"questionText":"Q","options":["a","b","c","d"],"correctAnswer":2,"type":"multipleChoice"})),
            &ALL,
        )
        .unwrap();
        assert_eq!(q.correct_answer, "c");
    }

    #[test]
    fn test_multiple_choice_invalid_items_dropped() {
        // 选项不足
        assert!(normalizer().normalize(
            &raw(json!({"questionText":"Q","options":["a","b","c"],"correctAnswer":"a","type":"multipleChoice"})),
            &ALL,
        )
        .is_none());
        // 答案不在选项中
        assert!(normalizer().normalize(
            &raw(json!({"questionText":"Q","options":["a","b","c","d"],"correctAnswer":"z","type":"multipleChoice"})),
            &ALL,
        )
        .is_none());
        // 没有题干
        assert!(normalizer().normalize(
            &raw(json!({"questionText":"  ","options":["a","b","c","d"],"correctAnswer":"a"})),
            &ALL,
        )
        .is_none());
    }

    #[test]
    fn test_short_answer_options_overwritten() {
        let q = normalizer().normalize(
            &raw(json!({"questionText":"简述牛顿第一定律","options":["x","y"],"correctAnswer":"惯性定律","type":"shortAnswer"})),
            &ALL,
        )
        .unwrap();
        assert!(q.options.is_empty());
        assert_eq!(q.correct_answer, "惯性定律");
    }

    #[test]
    fn test_type_outside_request_is_coerced() {
        // 只请求判断题，后端却声明为选择题
        let q = normalizer().normalize(
            &raw(json!({"questionText":"Q","options":["True","False"],"correctAnswer":"True","type":"multipleChoice"})),
            &[QuestionType::TrueFalse],
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::TrueFalse);
    }

    #[test]
    fn test_type_inferred_from_shape() {
        let q = normalizer().normalize(
            &raw(json!({"questionText":"Q","correctAnswer":"free text"})),
            &ALL,
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::ShortAnswer);

        let q = normalizer().normalize(
            &raw(json!({"questionText":"Q","options":["对","错"],"correctAnswer":"对"})),
            &ALL,
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::TrueFalse);
    }

    #[test]
    fn test_dedup_key_normalizes_case_and_whitespace() {
        assert_eq!(dedup_key("  What IS\n the   capital? "), "what is the capital?");
        assert_eq!(dedup_key("What is the capital?"), dedup_key("what  is the\tcapital?"));
    }

    #[test]
    fn test_deduplicator_first_occurrence_wins() {
        let make = |text: &str, answer: &str| GeneratedQuestion {
            question_text: text.into(),
            options: Vec::new(),
            correct_answer: answer.into(),
            explanation: String::new(),
            question_type: QuestionType::ShortAnswer,
        };
        let mut dedup = Deduplicator::new();
        let mut accepted = Vec::new();
        let dropped = dedup.merge_into(
            &mut accepted,
            vec![make("Q one", "first"), make("q  ONE", "second"), make("Q two", "x")],
        );
        assert_eq!(dropped, 1);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].correct_answer, "first");
    }
}
