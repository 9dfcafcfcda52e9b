//! 会话状态、事件、副作用与结果类型

use serde::{Deserialize, Serialize};

use crate::environment::FullscreenFailure;
use crate::models::{Answer, Identity, SubmissionRecord, SubmitTrigger};
use crate::session::answers::Navigation;
use crate::session::monitor::{ReentryStatus, Violation};

/// 会话状态
///
/// `NotStarted → InProgress → Completed`，`Interrupted` 只是进行中的确认步骤，
/// 只能回到 `InProgress` 或者进入 `Completed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Interrupted,
    Completed,
}

impl SessionState {
    /// 考试是否处于进行中（包括等待确认）
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::InProgress | SessionState::Interrupted)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::NotStarted => "未开始",
            SessionState::InProgress => "进行中",
            SessionState::Interrupted => "等待确认",
            SessionState::Completed => "已交卷",
        };
        f.write_str(label)
    }
}

/// 进入确认步骤的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionCause {
    /// 切换标签页 / 窗口被隐藏
    TabHidden,
    /// 试图关闭或刷新页面
    UnloadAttempt,
    /// 考生主动点击退出
    ParticipantRequest,
}

/// 请求全屏的目的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenPurpose {
    /// 开考前提
    Start,
    /// 非自愿退出全屏后的纠正
    Reentry,
}

/// 流入控制器的所有事件
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    // ---- 考生操作 ----
    BindIdentity(Identity),
    Start,
    Answer { index: usize, answer: Answer },
    Navigate(Navigation),
    Submit,
    RequestExit,
    ConfirmContinue,
    ConfirmExit,
    // ---- 环境信号 ----
    Tick,
    VisibilityChanged { hidden: bool },
    FullscreenChanged { active: bool },
    UnloadRequested,
    // ---- 异步操作回送 ----
    FullscreenResolved {
        purpose: FullscreenPurpose,
        result: Result<(), FullscreenFailure>,
    },
}

impl SessionEvent {
    /// 日志中使用的简短名称
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::BindIdentity(_) => "bind_identity",
            SessionEvent::Start => "start",
            SessionEvent::Answer { .. } => "answer",
            SessionEvent::Navigate(_) => "navigate",
            SessionEvent::Submit => "submit",
            SessionEvent::RequestExit => "request_exit",
            SessionEvent::ConfirmContinue => "confirm_continue",
            SessionEvent::ConfirmExit => "confirm_exit",
            SessionEvent::Tick => "tick",
            SessionEvent::VisibilityChanged { .. } => "visibility_changed",
            SessionEvent::FullscreenChanged { .. } => "fullscreen_changed",
            SessionEvent::UnloadRequested => "unload_requested",
            SessionEvent::FullscreenResolved { .. } => "fullscreen_resolved",
        }
    }
}

/// 控制器要求运行时执行的副作用
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AcquireFullscreen(FullscreenPurpose),
    ReleaseFullscreen,
    StartClock,
    StopClock,
    ArmMonitor,
    DisarmMonitor,
    PromptConfirmation {
        cause: InterruptionCause,
        tab_switch_count: u32,
    },
    Submit(Box<SubmissionRecord>),
    AlertOperator(ReentryStatus),
}

/// 一个事件被接受后的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    IdentityBound,
    /// 正在等待全屏请求完成
    StartPending,
    Started,
    AlreadyStarted,
    AnswerRecorded { answered: usize, total: usize },
    Navigated { cursor: usize },
    Ticked { remaining: u64 },
    Observed,
    ViolationRecorded(Violation),
    Interrupted(InterruptionCause),
    Resumed,
    Reentry(ReentryStatus),
    UnloadVetoed,
    UnloadAllowed,
    Submitted { trigger: SubmitTrigger, percentage: f64 },
    /// 终态之后的任何触发都被吸收
    AlreadySubmitted,
    Ignored,
}
