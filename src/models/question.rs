use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// 默认考试时长（分钟）
pub const DEFAULT_DURATION_MINUTES: u32 = 45;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// 单选题
    MultipleChoice,
    /// 填空题
    FillBlank,
    /// 主观题（由外部评分服务异步评分）
    Subjective,
}

impl QuestionKind {
    /// 是否可以在提交时自动评分
    pub fn is_objective(self) -> bool {
        !matches!(self, QuestionKind::Subjective)
    }
}

/// 标准答案：选项下标或文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Choice(usize),
    Text(String),
}

/// 题目（只读）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<CorrectAnswer>,
    pub points: u32,
}

/// 单选题最多的选项数，选项用 A-Z 标记
pub const MAX_OPTIONS: usize = 26;

impl Question {
    /// 检查题目定义是否自洽
    fn validate(&self, index: usize) -> Result<(), CatalogError> {
        if self.points == 0 {
            return Err(CatalogError::InvalidPoints { index });
        }

        let invalid = |reason: &str| CatalogError::InvalidQuestion {
            index,
            reason: reason.to_string(),
        };

        match (self.kind, &self.correct_answer) {
            (QuestionKind::MultipleChoice, Some(CorrectAnswer::Choice(choice))) => {
                if self.options.is_empty() {
                    return Err(invalid("单选题缺少选项"));
                }
                if self.options.len() > MAX_OPTIONS {
                    return Err(invalid("选项不能超过 26 个"));
                }
                if *choice >= self.options.len() {
                    return Err(invalid("标准答案超出选项范围"));
                }
            }
            (QuestionKind::MultipleChoice, _) => {
                return Err(invalid("单选题的标准答案必须是选项下标"));
            }
            (QuestionKind::FillBlank, Some(CorrectAnswer::Text(text))) => {
                if text.trim().is_empty() {
                    return Err(invalid("填空题的标准答案不能为空"));
                }
            }
            (QuestionKind::FillBlank, _) => return Err(invalid("填空题的标准答案必须是文本")),
            (QuestionKind::Subjective, None) => {}
            (QuestionKind::Subjective, Some(_)) => return Err(invalid("主观题不应有标准答案")),
        }

        Ok(())
    }
}

/// 一套试卷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    pub questions: Vec<Question>,
}

fn default_duration_minutes() -> u32 {
    DEFAULT_DURATION_MINUTES
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// 全部题目的总分
    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    /// 考试时长（秒）
    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// 主观题的题号列表
    pub fn subjective_indices(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.kind == QuestionKind::Subjective)
            .map(|(i, _)| i)
            .collect()
    }

    /// 校验整套试卷
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.questions.is_empty() {
            return Err(CatalogError::Empty {
                name: self.name.clone(),
            });
        }
        if self.duration_minutes == 0 {
            return Err(CatalogError::InvalidDuration);
        }
        for (index, question) in self.questions.iter().enumerate() {
            question.validate(index)?;
        }
        Ok(())
    }
}
