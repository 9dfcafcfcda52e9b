use serde::{Deserialize, Serialize};

/// 考生对某一题的作答
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// 选项下标
    Choice(usize),
    /// 文本作答（填空 / 主观）
    Text(String),
    /// 未作答
    #[default]
    Absent,
}

impl Answer {
    /// 是否算作已作答，空白文本视为未作答
    pub fn is_present(&self) -> bool {
        match self {
            Answer::Choice(_) => true,
            Answer::Text(text) => !text.trim().is_empty(),
            Answer::Absent => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Choice(i) => write!(f, "选项 {}", i),
            Answer::Text(text) => write!(f, "{}", crate::utils::logging::truncate_text(text, 40)),
            Answer::Absent => write!(f, "未作答"),
        }
    }
}
