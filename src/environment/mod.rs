//! 考试环境边界
//!
//! ## 职责
//!
//! - `Environment`：异步的全屏请求 / 退出，可能失败
//! - `SignalSource`：推送可见性、全屏、关闭页面三类信号
//!
//! 环境只产生事件，从不直接修改会话状态；所有信号都经 `SignalSink`
//! 进入会话运行时的事件队列。
//!
//! ## 实现
//!
//! - `browser` - 基于 chromiumoxide 的真实浏览器页面
//! - `scripted` - 可编排结果的环境，用于脱机模式和测试

pub mod browser;
pub mod scripted;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::session::runtime::SessionCommand;
use crate::session::state::SessionEvent;

pub use browser::{BrowserEnvironment, BrowserProbe};
pub use scripted::{ChannelSignalSource, ScriptedEnvironment};

/// 全屏请求失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullscreenFailure {
    /// 考生拒绝
    Declined,
    /// 环境无法提供全屏（不支持、页面已关闭等）
    Unavailable(String),
}

impl std::fmt::Display for FullscreenFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FullscreenFailure::Declined => write!(f, "考生拒绝进入全屏"),
            FullscreenFailure::Unavailable(reason) => write!(f, "全屏不可用: {}", reason),
        }
    }
}

/// 全屏能力
#[async_trait]
pub trait Environment: Send + Sync + 'static {
    async fn enter_fullscreen(&self) -> Result<(), FullscreenFailure>;

    async fn exit_fullscreen(&self) -> Result<(), FullscreenFailure>;
}

/// 环境推送的信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSignal {
    Visibility { hidden: bool },
    Fullscreen { active: bool },
    Unload,
}

impl From<EnvSignal> for SessionEvent {
    fn from(signal: EnvSignal) -> Self {
        match signal {
            EnvSignal::Visibility { hidden } => SessionEvent::VisibilityChanged { hidden },
            EnvSignal::Fullscreen { active } => SessionEvent::FullscreenChanged { active },
            EnvSignal::Unload => SessionEvent::UnloadRequested,
        }
    }
}

/// 信号投递口，发送不阻塞
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: UnboundedSender<SessionCommand>,
}

impl SignalSink {
    pub(crate) fn new(tx: UnboundedSender<SessionCommand>) -> Self {
        Self { tx }
    }

    /// 投递信号，会话已结束时返回 false
    pub fn emit(&self, signal: EnvSignal) -> bool {
        self.tx.send(SessionCommand::notify(signal.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 信号来源
///
/// 会话开始监视时调用 `attach`，返回的任务在会话结束时被中止，
/// 随后调用 `detach` 撤销来源在环境里留下的监听。
pub trait SignalSource: Send + Sync + 'static {
    fn attach(&self, sink: SignalSink) -> JoinHandle<()>;

    fn detach(&self) {}
}
