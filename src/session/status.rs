//! 会话状态快照，供界面渲染

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Answer, Identity};
use crate::session::monitor::ReentryStatus;
use crate::session::state::{InterruptionCause, SessionState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub identity: Option<Identity>,
    /// 已绑定身份，可以开考
    pub armed: bool,
    /// 正在等待开考的全屏请求
    pub start_pending: bool,
    pub time_remaining_seconds: u64,
    /// MM:SS
    pub time_display: String,
    /// 剩余时间不足 5 分钟
    pub running_low: bool,
    pub clock_running: bool,
    pub tab_switch_count: u32,
    pub fullscreen_exit_count: u32,
    pub fullscreen: bool,
    pub answered: usize,
    pub total_questions: usize,
    pub can_submit: bool,
    pub cursor: usize,
    /// 光标所在题目的作答
    pub current_answer: Answer,
    /// 等待考生确认的提示
    pub prompt: Option<InterruptionCause>,
    #[serde(skip)]
    pub last_reentry: Option<ReentryStatus>,
    pub submission_id: Option<Uuid>,
}

impl SessionStatus {
    /// 单行状态，用于控制台输出
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "[{}] 剩余 {}{} | 已答 {}/{} | 当前第 {} 题 | 切屏 {} 次 | 退出全屏 {} 次",
            self.state,
            self.time_display,
            if self.running_low { " ⚠️" } else { "" },
            self.answered,
            self.total_questions,
            self.cursor + 1,
            self.tab_switch_count,
            self.fullscreen_exit_count,
        );
        if self.can_submit {
            line.push_str(" | 可以交卷");
        }
        line
    }
}
