use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::answer::Answer;
use crate::models::identity::Identity;

/// 触发终态提交的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    /// 考生主动交卷
    ExplicitSubmit,
    /// 倒计时结束自动交卷
    TimerExpired,
    /// 中断确认后退出并交卷
    InterruptionExit,
}

impl std::fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SubmitTrigger::ExplicitSubmit => "主动交卷",
            SubmitTrigger::TimerExpired => "时间到自动交卷",
            SubmitTrigger::InterruptionExit => "中断退出交卷",
        };
        f.write_str(label)
    }
}

/// 客观题得分，在提交时计算一次后冻结
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveScore {
    pub awarded_points: u32,
    pub total_points: u32,
    pub percentage: f64,
    /// 等待主观评分的题号
    pub pending_subjective: Vec<usize>,
}

/// 唯一的终态提交记录，生成后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub identity: Identity,
    pub answers: Vec<Answer>,
    pub objective: ObjectiveScore,
    pub trigger: SubmitTrigger,
    pub tab_switch_count: u32,
    pub fullscreen_exit_count: u32,
    pub time_remaining_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

/// 单道主观题的评分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionGrade {
    pub index: usize,
    pub score: f64,
    pub max_points: u32,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// 主观题异步评分结果
///
/// 与提交记录分开保存，`revised_percentage` 不覆盖冻结的客观分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectiveEvaluation {
    pub submission_id: Uuid,
    pub per_question: Vec<QuestionGrade>,
    pub subjective_points: f64,
    pub revised_percentage: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// 提交记录及其（可选的）主观评分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedSubmission {
    pub record: SubmissionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<SubjectiveEvaluation>,
}

impl ReviewedSubmission {
    /// 下游排名使用的分数：有主观评分时优先使用修订后的百分比
    pub fn effective_percentage(&self) -> f64 {
        self.evaluation
            .as_ref()
            .map(|e| e.revised_percentage)
            .unwrap_or(self.record.objective.percentage)
    }
}
