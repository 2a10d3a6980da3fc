//! Prompt catalog: the fixed set of task personas and their system prompts.

use crate::error::VersaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clause appended to the weekly-report prompt when the caller supplies a role.
const ROLE_CLAUSE_TEMPLATE: &str = "\n当前用户角色设定：{role}。请基于该身份调整表达维度和专业词汇。";

const WEEKLY_REPORT_PROMPT: &str = r#"你是一位资深大厂项目专家/高级产品经理。你的任务是将用户提供的零散信息，提炼为专业、量化、极简、结果导向的周报。

核心原则：
1. 零废话：严禁任何解释、说明、过度修饰或语气词。
2. 忠于事实：仅基于用户输入内容提炼，禁止添加未提及的任务、数据、细节，严禁幻觉。
3. 量化优先：优先提取输入中的数字、百分比、时间点、结果。
4. 专业表达：将“做了XX”升级为“完成/推进/落地/优化/上线/交付XX”，突出动作和成果。
5. 结构与格式：
   严格使用纯文本，禁止 Markdown、禁止表格、禁止特殊符号。结构固定为：
   【本周核心进展】
   （仅列出已达成的关键结果/产出，使用数字序号 1.2.3. 递增排列，用数据说话，突出价值）
   【下周工作计划】
   （仅列出明确的后续执行动作，使用数字序号 1.2.3. 递增排列，明确优先级和目标）

示例：
输入：
1. 不同模型文学能力评估 100%
2. AI文学创作网页转图片API开发 50%
3. AI文摘需求沟通，多说话人识别处理 80%

输出：
【本周核心进展】
1. 完成不同大模型文学创作能力全维度评估，覆盖10+主流模型，输出评估报告。
2. 推进AI文学创作网页转图片API开发，完成核心渲染逻辑及接口设计，整体进度达50%。
3. 落地AI文摘多说话人识别处理方案，完成80%核心场景的需求沟通与技术验证。

【下周工作计划】
1. 完成AI文学创作网页转图片API的剩余开发及联调，计划上线测试。
2. 推进AI文摘多说话人识别处理的剩余场景验证，完成需求文档输出。"#;

const XHS_STYLE_PROMPT: &str = r#"你是一位深谙小红书算法的爆款操盘手。请将用户输入内容重构成具备爆款潜力的笔记。
结构：
1. [爆款标题]：提供3个不同风格的选项。
2. [正文逻辑]：包含痛点共鸣、分点叙述（使用数字序号 1. 2. 3. 递增排列，并配 Emoji）、互动结尾。
3. [标签矩阵]：包含行业大类和流量长尾标签。
要求：
1. 严禁出现任何语气化用词或解释性说明。"#;

const EMAIL_POLISH_PROMPT: &str = r#"你是一位精通职场沟通的资深行政/商务顾问。你的任务是将用户提供的粗糙、口语化的邮件草稿，翻译为专业、得体、礼貌的商务邮件。
结构：
1. [邮件主题]：简明扼要且具吸引力。
2. [正文]：包含称呼、开场白、核心事项、行动建议、结语。
要求：
1. 保持专业语调，根据内容自动判断所需的礼貌程度（如：道歉、请求、通知）。"#;

const MEETING_MINUTES_PROMPT: &str = r#"你是一位极简主义的会议秘书。请从杂乱的会议记录中提取核心决策和待办事项。
格式要求：
【会议主题】：(自拟)
【核心结论】：(分项列出关键决定)
【行动清单】：(明确 责任人/任务/截止日期，若无责任人则仅列任务)
要求：
1. 严禁冗长描述，只保留干货。"#;

/// The persona a request is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Weekly status report; the only task that accepts a role.
    WeeklyReport,
    /// Xiaohongshu-style social post.
    XhsStyle,
    /// Business email polishing.
    EmailPolish,
    /// Decisions and action items from meeting notes.
    MeetingMinutes,
}

impl TaskType {
    /// Every task type, in catalog order.
    pub const ALL: [TaskType; 4] = [
        TaskType::WeeklyReport,
        TaskType::XhsStyle,
        TaskType::EmailPolish,
        TaskType::MeetingMinutes,
    ];

    /// Wire identifier, e.g. `"WEEKLY_REPORT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::WeeklyReport => "WEEKLY_REPORT",
            TaskType::XhsStyle => "XHS_STYLE",
            TaskType::EmailPolish => "EMAIL_POLISH",
            TaskType::MeetingMinutes => "MEETING_MINUTES",
        }
    }

    /// The base system prompt for this task, without customization.
    pub fn base_prompt(&self) -> &'static str {
        match self {
            TaskType::WeeklyReport => WEEKLY_REPORT_PROMPT,
            TaskType::XhsStyle => XHS_STYLE_PROMPT,
            TaskType::EmailPolish => EMAIL_POLISH_PROMPT,
            TaskType::MeetingMinutes => MEETING_MINUTES_PROMPT,
        }
    }

    /// Whether this task honours a caller-supplied role.
    pub fn accepts_role(&self) -> bool {
        matches!(self, TaskType::WeeklyReport)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = VersaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| VersaError::InvalidTaskType(s.to_string()))
    }
}

/// Resolve the system prompt for `task`, applying the role clause when allowed.
///
/// The role is trimmed, and an empty or whitespace-only role is treated as
/// absent. This deliberately differs from appending any non-empty string:
/// a clause like `当前用户角色设定：   。` only degrades the prompt.
///
/// ```
/// use versa::prompt::{system_prompt, TaskType};
///
/// let prompt = system_prompt(TaskType::WeeklyReport, Some("后端工程师"));
/// assert!(prompt.ends_with("当前用户角色设定：后端工程师。请基于该身份调整表达维度和专业词汇。"));
///
/// let plain = system_prompt(TaskType::EmailPolish, Some("后端工程师"));
/// assert_eq!(plain, TaskType::EmailPolish.base_prompt());
/// ```
pub fn system_prompt(task: TaskType, role: Option<&str>) -> String {
    let mut prompt = task.base_prompt().to_string();
    if task.accepts_role() {
        if let Some(role) = role.map(str::trim).filter(|r| !r.is_empty()) {
            prompt.push_str(&ROLE_CLAUSE_TEMPLATE.replace("{role}", role));
        }
    }
    prompt
}
