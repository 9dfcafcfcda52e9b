//! 考试会话
//!
//! - `clock` - 倒计时
//! - `monitor` - 切屏 / 退出全屏计数
//! - `answers` - 作答存储
//! - `state` - 状态、事件、副作用
//! - `controller` - 纯状态机，唯一的写入者
//! - `runtime` - 事件循环与副作用执行
//! - `status` - 状态快照

pub mod answers;
pub mod clock;
pub mod controller;
pub mod monitor;
pub mod runtime;
pub mod state;
pub mod status;

pub use answers::{AnswerStore, Navigation};
pub use clock::{format_seconds, Clock, TickOutcome};
pub use controller::{ControllerSettings, SessionController};
pub use monitor::{IntegrityMonitor, ReentryStatus, Violation};
pub use runtime::{
    spawn_session, spawn_session_with_period, SessionCommand, SessionHandle, SessionServices,
    SubmissionSink, UnloadDecision,
};
pub use state::{Effect, FullscreenPurpose, InterruptionCause, Outcome, SessionEvent, SessionState};
pub use status::SessionStatus;
