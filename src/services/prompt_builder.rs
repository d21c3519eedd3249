//! 提示词构建 - 业务能力层
//!
//! 纯函数，不做任何 I/O。后端没有结构化 schema 约束，
//! 所以题目数量、JSON 形状、各题型规则都要以文字写进提示词

use crate::models::question::{distribute_counts, MULTIPLE_CHOICE_OPTION_COUNT, TRUE_FALSE_OPTIONS};
use crate::models::{
    ExplainRequest, GenerationRequest, QuestionType, StudyPlanRequest, SummarizeRequest,
    SummaryComplexity,
};

/// 摘要的系统消息
pub const SUMMARY_SYSTEM: &str = "你是一个专业的学习助手，擅长把学习材料整理成清晰、准确、便于复习的总结。只依据给定材料，不要编造内容。";

/// 出题的系统消息
pub const QUESTION_SYSTEM: &str = "你是一个专业的出题老师，擅长根据学习材料编写高质量的练习题。你只输出合法的 JSON，不输出任何解释性文字。";

/// 讲解的系统消息
pub const EXPLAIN_SYSTEM: &str = "你是一个耐心的老师，擅长用符合学生水平的语言讲清楚概念。";

/// 学习计划的系统消息
pub const STUDY_PLAN_SYSTEM: &str = "你是一个经验丰富的学习规划师，擅长制定切实可行、循序渐进的学习计划。";

/// 追问对话的系统消息
pub const FOLLOW_UP_SYSTEM: &str = "你是一个耐心的学习助手，结合之前的对话回答学生的追问。回答要准确、简洁，必要时举例说明。";

/// 有附件时加在最前面的说明
pub const VISION_PREFIX: &str = "请先仔细分析附带的图片内容（包括其中的文字、公式、图表），再结合图片回答下面的问题。\n\n";

/// 提示词构建器
pub struct PromptBuilder;

impl PromptBuilder {
    /// 构建摘要提示词
    ///
    /// 三档模板：简要（要点）/ 详细（编号）/ 全面（分章节）
    pub fn summary(request: &SummarizeRequest, with_images: bool) -> String {
        let count_rule = match request.count {
            Some(n) => format!("- 总结必须恰好包含 {} 个要点，不多不少\n", n),
            None => String::new(),
        };

        let template = match request.complexity {
            SummaryComplexity::Brief => {
                "请用简洁的要点列表概括下面的学习材料。\n\n\
                 【格式要求】\n\
                 - 每个要点以 \"- \" 开头，独占一行\n\
                 - 每个要点不超过一句话，只保留最核心的信息\n"
            }
            SummaryComplexity::Detailed => {
                "请详细总结下面的学习材料。\n\n\
                 【格式要求】\n\
                 - 使用编号列表（1. 2. 3. ……），每条独占一行\n\
                 - 每条写出一个关键概念，并用一两句话说明其含义或作用\n"
            }
            SummaryComplexity::Comprehensive => {
                "请对下面的学习材料做一份全面、结构化的总结。\n\n\
                 【格式要求】\n\
                 - 按章节组织，每个章节以 \"## \" 开头的标题开始\n\
                 - 至少包含：概述、核心概念、重要细节与例子、总结 四个章节\n\
                 - 章节内使用 \"- \" 开头的要点\n"
            }
        };

        format!(
            "{}{}{}\n学习材料：\n{}",
            vision_prefix(with_images),
            template,
            count_rule,
            material_or_placeholder(&request.text, with_images)
        )
    }

    /// 构建出题提示词
    ///
    /// `count` 为本次（子批次）要求的题目数量，可能小于请求总数
    pub fn questions(request: &GenerationRequest, count: usize, with_images: bool) -> String {
        let types = &request.question_types;
        let mut prompt = String::new();

        prompt.push_str(vision_prefix(with_images));
        prompt.push_str(&format!(
            "根据下面的学习材料，生成恰好 {} 道练习题。\n\n",
            count
        ));

        prompt.push_str("【题型分配】\n");
        if types.len() == 1 {
            prompt.push_str(&format!(
                "- 全部 {} 道都是{} ({})\n",
                count,
                types[0].display_name(),
                types[0].name()
            ));
        } else {
            for (question_type, n) in distribute_counts(count, types) {
                prompt.push_str(&format!(
                    "- {} ({}): 约 {} 道\n",
                    question_type.display_name(),
                    question_type.name(),
                    n
                ));
            }
        }

        let type_names: Vec<String> = types.iter().map(|t| format!("\"{}\"", t.name())).collect();
        prompt.push_str(&format!(
            r#"
【输出格式】
只返回一个 JSON 数组，不要输出任何其他文字，也不要使用 markdown 代码块。
数组长度必须恰好为 {}，每个元素是如下形状的对象：
{{"questionText": "题干", "options": ["选项"], "correctAnswer": "正确答案", "explanation": "解析", "type": {}}}
"#,
            count,
            type_names.join(" | ")
        ));

        prompt.push_str("\n【各题型规则】\n");
        for question_type in types {
            prompt.push_str(&type_rule(*question_type));
            prompt.push('\n');
        }

        prompt.push_str(
            "\n【其他要求】\n\
             - 每道题考查不同的知识点，题干不能重复\n\
             - 题目必须能从学习材料中找到依据\n\
             - explanation 用一两句话说明答案的依据\n",
        );

        prompt.push_str("\n学习材料：\n");
        prompt.push_str(&material_or_placeholder(&request.source_text, with_images));
        prompt
    }

    /// 构建概念讲解提示词
    pub fn explanation(request: &ExplainRequest, with_images: bool) -> String {
        format!(
            r#"{}请向{}讲解下面这个概念：{}

【讲解要求】
1. 先用一句话给出准确的定义
2. 分步骤展开讲解，语言符合学生的水平
3. 给出至少一个贴近生活的例子
4. 指出一个常见的误区
5. 最后用两三句话总结"#,
            vision_prefix(with_images),
            request.level.display_name(),
            request.concept.trim()
        )
    }

    /// 构建学习计划提示词
    pub fn study_plan(request: &StudyPlanRequest) -> String {
        let topics: Vec<String> = request
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| format!("- {}", t))
            .collect();

        format!(
            r#"请为下面的学习主题制定一个为期 {} 天、每天 {} 小时的学习计划。

学习主题：
{}

【计划要求】
1. 按天列出（第 1 天、第 2 天 ……），每天写明学习的主题和时间分配
2. 每天的总时长不超过 {} 小时
3. 由浅入深安排内容，定期安排复习和自测
4. 最后一天安排综合复习
5. 在结尾给出三条学习建议"#,
            request.days_available,
            format_hours(request.hours_per_day),
            topics.join("\n"),
            format_hours(request.hours_per_day)
        )
    }

    /// 构建追问对话的系统消息
    pub fn follow_up_system(context: Option<&str>) -> String {
        match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(ctx) => format!("{}\n\n学习材料背景：\n{}", FOLLOW_UP_SYSTEM, ctx),
            None => FOLLOW_UP_SYSTEM.to_string(),
        }
    }
}

fn vision_prefix(with_images: bool) -> &'static str {
    if with_images {
        VISION_PREFIX
    } else {
        ""
    }
}

fn material_or_placeholder(text: &str, with_images: bool) -> String {
    let text = text.trim();
    if text.is_empty() && with_images {
        "（材料见附带的图片）".to_string()
    } else {
        text.to_string()
    }
}

fn format_hours(hours: f32) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as u32)
    } else {
        format!("{:.1}", hours)
    }
}

/// 单个题型的格式规则
fn type_rule(question_type: QuestionType) -> String {
    match question_type {
        QuestionType::MultipleChoice => format!(
            "- multipleChoice：options 必须恰好包含 {} 个互不相同的选项，选项前不要加 A/B/C/D 标号；correctAnswer 必须与其中一个选项的文字完全一致",
            MULTIPLE_CHOICE_OPTION_COUNT
        ),
        QuestionType::TrueFalse => format!(
            "- trueFalse：options 必须恰好为 [\"{}\", \"{}\"]；correctAnswer 只能是 \"{}\" 或 \"{}\"",
            TRUE_FALSE_OPTIONS[0], TRUE_FALSE_OPTIONS[1], TRUE_FALSE_OPTIONS[0], TRUE_FALSE_OPTIONS[1]
        ),
        QuestionType::ShortAnswer => {
            "- shortAnswer：options 必须为空数组 []；correctAnswer 为简短的参考答案".to_string()
        }
    }
}
