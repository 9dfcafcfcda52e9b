//! 会话控制器 - 状态机
//!
//! ## 职责
//!
//! 控制器是会话状态唯一的写入者。考生操作、倒计时 tick、可见性 / 全屏 /
//! 关闭页面信号都作为 `SessionEvent` 送进 `apply`，一次只处理一个事件，
//! 所以任何守卫都不会看到被并发事件改了一半的状态。
//!
//! 控制器本身不做 I/O：需要环境配合的动作以 `Effect` 的形式排队，
//! 由运行时取走执行，异步结果再以事件的形式回送。
//!
//! ## 中断期间的计时
//!
//! 等待确认（`Interrupted`）时默认倒计时继续走，切出去的时间照样计入考试时长。
//! 设置 `pause_clock_during_interruption` 可以改为暂停。中断期间到时同样自动交卷。

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::environment::FullscreenFailure;
use crate::error::SessionError;
use crate::models::{Answer, Catalog, Identity, QuestionKind, SubmissionRecord, SubmitTrigger};
use crate::services::registry::EmailRegistry;
use crate::services::scorer;
use crate::session::answers::{AnswerStore, Navigation};
use crate::session::clock::{Clock, TickOutcome};
use crate::session::monitor::{IntegrityMonitor, ReentryStatus, Violation};
use crate::session::state::{
    Effect, FullscreenPurpose, InterruptionCause, Outcome, SessionEvent, SessionState,
};
use crate::session::status::SessionStatus;

/// 默认连续重新进入全屏失败多少次后通知监考人员
pub const DEFAULT_MAX_REENTRY_FAILURES: u32 = 3;

/// 控制器设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// 考试时长（秒）
    pub duration_seconds: u64,
    /// 等待确认时是否暂停倒计时
    pub pause_clock_during_interruption: bool,
    /// 连续重新进入全屏失败的上限
    pub max_reentry_failures: u32,
}

impl ControllerSettings {
    pub fn for_catalog(catalog: &Catalog) -> Self {
        Self {
            duration_seconds: catalog.duration_seconds(),
            pause_clock_during_interruption: false,
            max_reentry_failures: DEFAULT_MAX_REENTRY_FAILURES,
        }
    }
}

pub struct SessionController {
    catalog: Arc<Catalog>,
    settings: ControllerSettings,
    registry: Arc<dyn EmailRegistry>,
    state: SessionState,
    identity: Option<Identity>,
    clock: Clock,
    monitor: IntegrityMonitor,
    answers: AnswerStore,
    start_pending: bool,
    prompt: Option<InterruptionCause>,
    last_reentry: Option<ReentryStatus>,
    started_at: Option<DateTime<Utc>>,
    record: Option<SubmissionRecord>,
    effects: Vec<Effect>,
}

impl SessionController {
    pub fn new(
        catalog: Arc<Catalog>,
        settings: ControllerSettings,
        registry: Arc<dyn EmailRegistry>,
    ) -> Self {
        let answers = AnswerStore::new(catalog.len());
        Self {
            clock: Clock::new(settings.duration_seconds),
            monitor: IntegrityMonitor::new(settings.max_reentry_failures),
            catalog,
            settings,
            registry,
            state: SessionState::NotStarted,
            identity: None,
            answers,
            start_pending: false,
            prompt: None,
            last_reentry: None,
            started_at: None,
            record: None,
            effects: Vec::new(),
        }
    }

    /// 处理一个事件
    pub fn apply(&mut self, event: SessionEvent) -> Result<Outcome, SessionError> {
        debug!("会话事件: {} (状态: {})", event.name(), self.state);

        if self.state == SessionState::Completed {
            return Ok(self.absorb_after_completion(event));
        }

        match event {
            SessionEvent::BindIdentity(identity) => self.bind_identity(identity),
            SessionEvent::Start => self.request_start(),
            SessionEvent::Answer { index, answer } => self.record_answer(index, answer),
            SessionEvent::Navigate(nav) => self.navigate(nav),
            SessionEvent::Submit => self.submit(),
            SessionEvent::RequestExit => self.request_exit(),
            SessionEvent::ConfirmContinue => self.confirm_continue(),
            SessionEvent::ConfirmExit => self.confirm_exit(),
            SessionEvent::Tick => Ok(self.tick()),
            SessionEvent::VisibilityChanged { hidden } => Ok(self.visibility_changed(hidden)),
            SessionEvent::FullscreenChanged { active } => Ok(self.fullscreen_changed(active)),
            SessionEvent::UnloadRequested => Ok(self.unload_requested()),
            SessionEvent::FullscreenResolved { purpose, result } => match purpose {
                FullscreenPurpose::Start => self.finish_start(result),
                FullscreenPurpose::Reentry => Ok(self.finish_reentry(result)),
            },
        }
    }

    /// 取走待执行的副作用
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// 已生成的提交记录
    pub fn record(&self) -> Option<&SubmissionRecord> {
        self.record.as_ref()
    }

    pub fn time_remaining_seconds(&self) -> u64 {
        self.clock.remaining()
    }

    pub fn tab_switch_count(&self) -> u32 {
        self.monitor.tab_switch_count()
    }

    pub fn fullscreen_exit_count(&self) -> u32 {
        self.monitor.fullscreen_exit_count()
    }

    /// 当前状态快照
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            identity: self.identity.clone(),
            armed: self.identity.is_some(),
            start_pending: self.start_pending,
            time_remaining_seconds: self.clock.remaining(),
            time_display: self.clock.format(),
            running_low: self.clock.is_running_low(),
            clock_running: self.clock.is_running(),
            tab_switch_count: self.monitor.tab_switch_count(),
            fullscreen_exit_count: self.monitor.fullscreen_exit_count(),
            fullscreen: self.monitor.is_fullscreen(),
            answered: self.answers.answered_count(),
            total_questions: self.answers.len(),
            can_submit: self.state == SessionState::InProgress && self.answers.is_complete(),
            cursor: self.answers.cursor(),
            current_answer: self
                .answers
                .get(self.answers.cursor())
                .cloned()
                .unwrap_or_default(),
            prompt: self.prompt,
            last_reentry: self.last_reentry,
            submission_id: self.record.as_ref().map(|r| r.id),
        }
    }

    // ========== 开考前 ==========

    fn bind_identity(&mut self, identity: Identity) -> Result<Outcome, SessionError> {
        if self.state.is_live() {
            return Err(SessionError::IdentityLocked);
        }
        if self.start_pending {
            return Err(SessionError::StartPending);
        }
        if self.registry.has(&identity.email_key) {
            warn!("⚠️ 邮箱 {} 已经使用过，拒绝绑定", identity.email_key);
            return Err(SessionError::DuplicateIdentity {
                email_key: identity.email_key,
            });
        }

        // 新身份：重置时钟、计数器和作答
        self.clock.reset(self.settings.duration_seconds);
        self.monitor.reset_for_new_identity();
        self.answers.clear();
        self.prompt = None;
        self.last_reentry = None;
        info!("👤 已确认考生身份: {}", identity);
        self.identity = Some(identity);

        Ok(Outcome::IdentityBound)
    }

    fn request_start(&mut self) -> Result<Outcome, SessionError> {
        if self.state.is_live() {
            return Ok(Outcome::AlreadyStarted);
        }
        let Some(identity) = &self.identity else {
            return Err(SessionError::NotArmed);
        };
        if self.start_pending {
            return Err(SessionError::StartPending);
        }
        if self.registry.has(&identity.email_key) {
            return Err(SessionError::DuplicateIdentity {
                email_key: identity.email_key.clone(),
            });
        }

        self.start_pending = true;
        self.effects
            .push(Effect::AcquireFullscreen(FullscreenPurpose::Start));
        info!("🖥️ 正在为 {} 请求全屏...", identity.email_key);

        Ok(Outcome::StartPending)
    }

    fn finish_start(
        &mut self,
        result: Result<(), FullscreenFailure>,
    ) -> Result<Outcome, SessionError> {
        if !self.start_pending || self.state.is_live() {
            debug!("忽略过期的开考全屏结果");
            return Ok(Outcome::Ignored);
        }
        self.start_pending = false;

        match result {
            Ok(()) => {}
            Err(FullscreenFailure::Declined) => {
                warn!("⚠️ 考生拒绝进入全屏，考试未开始");
                return Err(SessionError::FullscreenDenied);
            }
            Err(FullscreenFailure::Unavailable(reason)) => {
                warn!("⚠️ 无法建立全屏监考环境: {}", reason);
                return Err(SessionError::FullscreenUnavailable { reason });
            }
        }

        let Some(identity) = self.identity.clone() else {
            self.effects.push(Effect::ReleaseFullscreen);
            return Err(SessionError::NotArmed);
        };

        // 开考时才登记邮箱，检查和登记一次完成
        match self.registry.claim(&identity.email_key) {
            Ok(true) => {}
            Ok(false) => {
                self.effects.push(Effect::ReleaseFullscreen);
                return Err(SessionError::DuplicateIdentity {
                    email_key: identity.email_key,
                });
            }
            Err(e) => {
                error!("❌ 邮箱注册表写入失败: {}", e);
                self.effects.push(Effect::ReleaseFullscreen);
                return Err(SessionError::RegistryUnavailable {
                    reason: e.to_string(),
                });
            }
        }

        self.monitor.reset_for_new_identity();
        self.monitor.arm();
        self.answers.open();
        self.clock.start();
        self.started_at = Some(Utc::now());
        self.state = SessionState::InProgress;
        self.effects.push(Effect::StartClock);
        self.effects.push(Effect::ArmMonitor);

        info!(
            "🚀 考试开始: {} | {} 道题 | 时长 {}",
            identity,
            self.catalog.len(),
            self.clock.format()
        );

        Ok(Outcome::Started)
    }

    // ========== 作答 ==========

    fn record_answer(&mut self, index: usize, answer: Answer) -> Result<Outcome, SessionError> {
        if self.state == SessionState::InProgress {
            self.check_answer_kind(index, &answer)?;
        }
        self.answers.set(index, answer, self.state)?;

        Ok(Outcome::AnswerRecorded {
            answered: self.answers.answered_count(),
            total: self.answers.len(),
        })
    }

    fn check_answer_kind(&self, index: usize, answer: &Answer) -> Result<(), SessionError> {
        let question = self
            .catalog
            .question(index)
            .ok_or(SessionError::QuestionOutOfRange {
                index,
                total: self.catalog.len(),
            })?;

        let mismatch = |reason: String| SessionError::AnswerMismatch { index, reason };
        match (question.kind, answer) {
            (_, Answer::Absent) => Ok(()),
            (QuestionKind::MultipleChoice, Answer::Choice(choice)) => {
                if *choice < question.options.len() {
                    Ok(())
                } else {
                    Err(mismatch(format!(
                        "选项 {} 超出范围 [0, {})",
                        choice,
                        question.options.len()
                    )))
                }
            }
            (QuestionKind::MultipleChoice, Answer::Text(_)) => {
                Err(mismatch("单选题需要选择选项".to_string()))
            }
            (QuestionKind::FillBlank | QuestionKind::Subjective, Answer::Text(_)) => Ok(()),
            (QuestionKind::FillBlank | QuestionKind::Subjective, Answer::Choice(_)) => {
                Err(mismatch("该题需要文本作答".to_string()))
            }
        }
    }

    fn navigate(&mut self, nav: Navigation) -> Result<Outcome, SessionError> {
        if self.state != SessionState::InProgress {
            return Err(SessionError::NotAcceptingInput { state: self.state });
        }
        Ok(Outcome::Navigated {
            cursor: self.answers.navigate(nav),
        })
    }

    fn submit(&mut self) -> Result<Outcome, SessionError> {
        match self.state {
            SessionState::InProgress => {
                if !self.answers.is_complete() {
                    return Err(SessionError::Incomplete {
                        answered: self.answers.answered_count(),
                        total: self.answers.len(),
                    });
                }
                Ok(self.complete(SubmitTrigger::ExplicitSubmit))
            }
            SessionState::Interrupted => Err(SessionError::ConfirmationPending),
            _ => Err(SessionError::NotAcceptingInput { state: self.state }),
        }
    }

    // ========== 中断确认 ==========

    fn request_exit(&mut self) -> Result<Outcome, SessionError> {
        match self.state {
            SessionState::InProgress => Ok(self.interrupt(InterruptionCause::ParticipantRequest)),
            SessionState::Interrupted => Ok(Outcome::Interrupted(
                self.prompt.unwrap_or(InterruptionCause::ParticipantRequest),
            )),
            _ => Err(SessionError::NotAcceptingInput { state: self.state }),
        }
    }

    fn interrupt(&mut self, cause: InterruptionCause) -> Outcome {
        self.state = SessionState::Interrupted;
        self.prompt = Some(cause);
        self.monitor.set_counting(false);
        self.answers.seal();
        if self.settings.pause_clock_during_interruption {
            self.clock.pause();
        }
        self.effects.push(Effect::PromptConfirmation {
            cause,
            tab_switch_count: self.monitor.tab_switch_count(),
        });
        Outcome::Interrupted(cause)
    }

    fn confirm_continue(&mut self) -> Result<Outcome, SessionError> {
        if self.state != SessionState::Interrupted {
            return Err(SessionError::NothingToConfirm);
        }

        self.state = SessionState::InProgress;
        self.prompt = None;
        self.monitor.set_counting(true);
        self.answers.open();
        if self.settings.pause_clock_during_interruption {
            self.clock.start();
        }
        if !self.monitor.is_fullscreen() {
            self.effects
                .push(Effect::AcquireFullscreen(FullscreenPurpose::Reentry));
        }
        info!("▶️ 考生选择继续考试，剩余 {}", self.clock.format());

        Ok(Outcome::Resumed)
    }

    fn confirm_exit(&mut self) -> Result<Outcome, SessionError> {
        if self.state != SessionState::Interrupted {
            return Err(SessionError::NothingToConfirm);
        }
        Ok(self.complete(SubmitTrigger::InterruptionExit))
    }

    // ========== 环境信号 ==========

    fn tick(&mut self) -> Outcome {
        if !self.state.is_live() {
            return Outcome::Ignored;
        }
        match self.clock.tick() {
            TickOutcome::Idle => Outcome::Ignored,
            TickOutcome::Ticked { remaining } => Outcome::Ticked { remaining },
            TickOutcome::Expired => {
                warn!("⏰ 考试时间到，自动交卷");
                self.complete(SubmitTrigger::TimerExpired)
            }
        }
    }

    fn visibility_changed(&mut self, hidden: bool) -> Outcome {
        let violation = self.monitor.observe_visibility(hidden);
        match violation {
            Some(violation @ Violation::TabHidden { count })
                if self.state == SessionState::InProgress =>
            {
                warn!("⚠️ 检测到切换标签页 (第 {} 次)", count);
                self.interrupt(InterruptionCause::TabHidden);
                Outcome::ViolationRecorded(violation)
            }
            _ => Outcome::Observed,
        }
    }

    fn fullscreen_changed(&mut self, active: bool) -> Outcome {
        let violation = self.monitor.observe_fullscreen(active);
        match violation {
            Some(violation @ Violation::FullscreenExit { count })
                if self.state == SessionState::InProgress =>
            {
                warn!("⚠️ 检测到退出全屏 (第 {} 次)，尝试恢复全屏", count);
                self.effects
                    .push(Effect::AcquireFullscreen(FullscreenPurpose::Reentry));
                Outcome::ViolationRecorded(violation)
            }
            _ => Outcome::Observed,
        }
    }

    fn unload_requested(&mut self) -> Outcome {
        match self.state {
            SessionState::InProgress => {
                warn!("⚠️ 考生试图关闭页面，已拦截并要求确认");
                self.interrupt(InterruptionCause::UnloadAttempt);
                Outcome::UnloadVetoed
            }
            SessionState::Interrupted => Outcome::UnloadVetoed,
            _ => Outcome::UnloadAllowed,
        }
    }

    fn finish_reentry(&mut self, result: Result<(), FullscreenFailure>) -> Outcome {
        if !self.state.is_live() {
            return Outcome::Ignored;
        }
        if let Err(failure) = &result {
            warn!("⚠️ 恢复全屏失败: {}", failure);
        }

        let status = self.monitor.record_reentry(result.is_ok());
        self.last_reentry = Some(status);
        if let ReentryStatus::Escalated {
            consecutive_failures,
        } = status
        {
            error!(
                "❌ 连续 {} 次无法恢复全屏，需要监考人员介入",
                consecutive_failures
            );
            self.effects.push(Effect::AlertOperator(status));
        }
        Outcome::Reentry(status)
    }

    // ========== 终态 ==========

    /// 唯一进入 `Completed` 的路径
    fn complete(&mut self, trigger: SubmitTrigger) -> Outcome {
        self.clock.stop();
        self.monitor.disarm();
        self.answers.seal();
        self.prompt = None;
        self.state = SessionState::Completed;

        let answers = self.answers.snapshot();
        let objective = scorer::score_objective(&self.catalog, &answers);
        let submitted_at = Utc::now();
        let identity = self.identity.clone().unwrap_or_else(|| Identity {
            display_name: String::new(),
            email_key: String::new(),
        });

        let record = SubmissionRecord {
            id: Uuid::new_v4(),
            identity,
            answers,
            objective,
            trigger,
            tab_switch_count: self.monitor.tab_switch_count(),
            fullscreen_exit_count: self.monitor.fullscreen_exit_count(),
            time_remaining_seconds: self.clock.remaining(),
            started_at: self.started_at.unwrap_or(submitted_at),
            submitted_at,
        };

        info!(
            "✅ 已交卷 ({}): {} | 客观分 {}/{} ({:.1}%) | 切屏 {} 次 | 退出全屏 {} 次",
            trigger,
            record.identity.email_key,
            record.objective.awarded_points,
            record.objective.total_points,
            record.objective.percentage,
            record.tab_switch_count,
            record.fullscreen_exit_count
        );

        let percentage = record.objective.percentage;
        self.record = Some(record.clone());

        self.effects.push(Effect::StopClock);
        self.effects.push(Effect::DisarmMonitor);
        self.effects.push(Effect::ReleaseFullscreen);
        self.effects.push(Effect::Submit(Box::new(record)));

        Outcome::Submitted {
            trigger,
            percentage,
        }
    }

    fn absorb_after_completion(&mut self, event: SessionEvent) -> Outcome {
        // 迟到的全屏成功会让页面重新全屏，需要再退出一次
        if let SessionEvent::FullscreenResolved { result: Ok(()), .. } = &event {
            self.effects.push(Effect::ReleaseFullscreen);
        }
        debug!("会话已交卷，吸收事件 {}", event.name());
        Outcome::AlreadySubmitted
    }
}
