//! 会话运行时 - 单写者事件循环
//!
//! ## 职责
//!
//! - 独占 `SessionController`，按到达顺序逐个处理事件
//! - 执行控制器产生的副作用：全屏请求、1 Hz 计时任务、信号订阅、提交记录
//! - 通过 watch 通道发布状态快照
//!
//! 全屏请求在后台任务中执行，结果作为 `FullscreenResolved` 回到队列，
//! 事件循环从不等待环境，所以全屏请求挂起时 tick 和信号照常处理。
//! 开考命令的回复会推迟到全屏结果到达之后。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::environment::{Environment, SignalSink, SignalSource};
use crate::error::{AppResult, SessionError};
use crate::models::{Answer, Identity, SubmissionRecord};
use crate::session::answers::Navigation;
use crate::session::controller::SessionController;
use crate::session::state::{Effect, FullscreenPurpose, Outcome, SessionEvent, SessionState};
use crate::session::status::SessionStatus;

/// 倒计时 tick 间隔
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

type Reply = oneshot::Sender<Result<Outcome, SessionError>>;

/// 进入事件队列的命令
#[derive(Debug)]
pub struct SessionCommand {
    pub(crate) event: SessionEvent,
    pub(crate) reply: Option<Reply>,
}

impl SessionCommand {
    /// 不需要回复的通知（环境信号、tick）
    pub fn notify(event: SessionEvent) -> Self {
        Self { event, reply: None }
    }

    /// 需要回复的请求
    pub(crate) fn request(
        event: SessionEvent,
    ) -> (Self, oneshot::Receiver<Result<Outcome, SessionError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                event,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// 提交记录的去向，每条记录只会被调用一次
#[async_trait]
pub trait SubmissionSink: Send + Sync + 'static {
    async fn deliver(&self, record: &SubmissionRecord) -> AppResult<()>;
}

/// 运行时依赖的外部能力
#[derive(Clone)]
pub struct SessionServices {
    pub environment: Arc<dyn Environment>,
    pub signals: Arc<dyn SignalSource>,
    pub submissions: Arc<dyn SubmissionSink>,
}

/// 关闭页面请求的裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Allow,
    Veto,
}

/// 启动会话运行时
///
/// 返回的任务在会话交卷且所有句柄都被释放后结束，输出最终的提交记录。
pub fn spawn_session(
    controller: SessionController,
    services: SessionServices,
) -> (SessionHandle, JoinHandle<Option<SubmissionRecord>>) {
    spawn_session_with_period(controller, services, TICK_PERIOD)
}

pub fn spawn_session_with_period(
    controller: SessionController,
    services: SessionServices,
    tick_period: Duration,
) -> (SessionHandle, JoinHandle<Option<SubmissionRecord>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(controller.status());

    let runtime = SessionRuntime {
        controller,
        services,
        tx: tx.downgrade(),
        rx,
        status_tx,
        tick_period,
        ticker: None,
        probe: None,
        pending_start: None,
    };
    let task = tokio::spawn(runtime.run());

    let handle = SessionHandle {
        tx,
        status: status_rx,
    };
    (handle, task)
}

struct SessionRuntime {
    controller: SessionController,
    services: SessionServices,
    tx: WeakUnboundedSender<SessionCommand>,
    rx: UnboundedReceiver<SessionCommand>,
    status_tx: watch::Sender<SessionStatus>,
    tick_period: Duration,
    ticker: Option<JoinHandle<()>>,
    probe: Option<JoinHandle<()>>,
    pending_start: Option<Reply>,
}

impl SessionRuntime {
    async fn run(mut self) -> Option<SubmissionRecord> {
        info!("🔄 会话运行时已启动");

        while let Some(command) = self.rx.recv().await {
            let SessionCommand { event, reply } = command;
            let resolves_start = matches!(
                event,
                SessionEvent::FullscreenResolved {
                    purpose: FullscreenPurpose::Start,
                    ..
                }
            );

            let result = self.controller.apply(event);
            if let Err(e) = &result {
                debug!("事件被拒绝: {}", e);
            }

            for effect in self.controller.take_effects() {
                self.execute(effect).await;
            }

            // 先发布快照，回复到达时调用方看到的已是新状态
            self.status_tx.send_replace(self.controller.status());
            self.route_reply(reply, resolves_start, result);
        }

        self.stop_ticker();
        self.stop_probe();
        if let Some(reply) = self.pending_start.take() {
            let _ = reply.send(Err(SessionError::Closed));
        }

        let record = self.controller.record().cloned();
        info!(
            "🔚 会话运行时结束 ({})",
            if record.is_some() { "已交卷" } else { "未交卷" }
        );
        record
    }

    fn route_reply(
        &mut self,
        reply: Option<Reply>,
        resolves_start: bool,
        result: Result<Outcome, SessionError>,
    ) {
        if resolves_start {
            // 全屏结果回送给等待中的开考请求
            if let Some(pending) = self.pending_start.take() {
                let _ = pending.send(result.clone());
            }
        }

        let Some(reply) = reply else {
            return;
        };
        if matches!(result, Ok(Outcome::StartPending)) {
            self.pending_start = Some(reply);
        } else {
            let _ = reply.send(result);
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::AcquireFullscreen(purpose) => self.acquire_fullscreen(purpose),
            Effect::ReleaseFullscreen => self.release_fullscreen(),
            Effect::StartClock => self.start_ticker(),
            Effect::StopClock => self.stop_ticker(),
            Effect::ArmMonitor => self.start_probe(),
            Effect::DisarmMonitor => self.stop_probe(),
            Effect::PromptConfirmation {
                cause,
                tab_switch_count,
            } => {
                info!(
                    "❓ 等待考生确认继续或退出 (原因: {:?}, 已切屏 {} 次)",
                    cause, tab_switch_count
                );
            }
            Effect::Submit(record) => {
                if let Err(e) = self.services.submissions.deliver(&record).await {
                    error!("❌ 提交记录写出失败 ({}): {}", record.id, e);
                }
            }
            Effect::AlertOperator(status) => {
                error!("🚨 通知监考人员: {:?}", status);
            }
        }
    }

    fn sender(&self) -> Option<UnboundedSender<SessionCommand>> {
        self.tx.upgrade()
    }

    fn acquire_fullscreen(&self, purpose: FullscreenPurpose) {
        let Some(tx) = self.sender() else {
            return;
        };
        let environment = Arc::clone(&self.services.environment);
        tokio::spawn(async move {
            let result = environment.enter_fullscreen().await;
            let _ = tx.send(SessionCommand::notify(SessionEvent::FullscreenResolved {
                purpose,
                result,
            }));
        });
    }

    fn release_fullscreen(&self) {
        let environment = Arc::clone(&self.services.environment);
        tokio::spawn(async move {
            if let Err(e) = environment.exit_fullscreen().await {
                warn!("⚠️ 退出全屏失败: {}", e);
            }
        });
    }

    fn start_ticker(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let Some(tx) = self.sender() else {
            return;
        };
        let period = self.tick_period;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // 第一次 tick 立即完成，跳过
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(SessionCommand::notify(SessionEvent::Tick)).is_err() {
                    break;
                }
            }
        }));
        debug!("计时任务已启动");
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!("计时任务已停止");
        }
    }

    fn start_probe(&mut self) {
        if self.probe.is_some() {
            return;
        }
        let Some(tx) = self.sender() else {
            return;
        };
        self.probe = Some(self.services.signals.attach(SignalSink::new(tx)));
    }

    fn stop_probe(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.abort();
            self.services.signals.detach();
            debug!("信号订阅已释放");
        }
    }
}

/// 会话句柄，所有操作都经事件队列交给运行时
#[derive(Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    async fn request(&self, event: SessionEvent) -> Result<Outcome, SessionError> {
        let (command, rx) = SessionCommand::request(event);
        self.tx.send(command).map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    fn notify(&self, event: SessionEvent) -> bool {
        self.tx.send(SessionCommand::notify(event)).is_ok()
    }

    /// 校验并绑定考生身份
    pub async fn bind_identity(
        &self,
        display_name: &str,
        email: &str,
    ) -> Result<Outcome, SessionError> {
        let identity = Identity::new(display_name, email)?;
        self.request(SessionEvent::BindIdentity(identity)).await
    }

    /// 开考，等待全屏请求完成后才返回
    pub async fn start(&self) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::Start).await
    }

    pub async fn answer(&self, index: usize, answer: Answer) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::Answer { index, answer }).await
    }

    pub async fn navigate(&self, nav: Navigation) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::Navigate(nav)).await
    }

    pub async fn submit(&self) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::Submit).await
    }

    pub async fn request_exit(&self) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::RequestExit).await
    }

    pub async fn confirm_continue(&self) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::ConfirmContinue).await
    }

    pub async fn confirm_exit(&self) -> Result<Outcome, SessionError> {
        self.request(SessionEvent::ConfirmExit).await
    }

    /// 投递可见性变化，不等待处理
    pub fn notify_visibility(&self, hidden: bool) -> bool {
        self.notify(SessionEvent::VisibilityChanged { hidden })
    }

    /// 投递全屏状态变化，不等待处理
    pub fn notify_fullscreen(&self, active: bool) -> bool {
        self.notify(SessionEvent::FullscreenChanged { active })
    }

    /// 页面即将关闭，询问是否放行
    pub async fn unload_requested(&self) -> Result<UnloadDecision, SessionError> {
        match self.request(SessionEvent::UnloadRequested).await? {
            Outcome::UnloadVetoed => Ok(UnloadDecision::Veto),
            _ => Ok(UnloadDecision::Allow),
        }
    }

    /// 当前状态快照
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// 等待会话交卷
    pub async fn wait_until_completed(&self) -> Result<SessionStatus, SessionError> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|s| s.state == SessionState::Completed)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(status.clone())
    }

    /// 供环境适配器使用的信号投递口
    pub fn signal_sink(&self) -> SignalSink {
        SignalSink::new(self.tx.clone())
    }
}
