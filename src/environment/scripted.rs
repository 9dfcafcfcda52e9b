//! 可编排的考试环境
//!
//! 脱机模式下总是允许全屏；测试中可以按顺序预设每次全屏请求的结果。

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{EnvSignal, Environment, FullscreenFailure, SignalSink, SignalSource};

/// 预设结果的环境
#[derive(Debug)]
pub struct ScriptedEnvironment {
    queued: Mutex<VecDeque<Result<(), FullscreenFailure>>>,
    fallback: Result<(), FullscreenFailure>,
    latency: Duration,
    enter_calls: AtomicUsize,
    exit_calls: AtomicUsize,
}

impl ScriptedEnvironment {
    fn with_fallback(fallback: Result<(), FullscreenFailure>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            enter_calls: AtomicUsize::new(0),
            exit_calls: AtomicUsize::new(0),
        }
    }

    /// 总是允许全屏
    pub fn granting() -> Self {
        Self::with_fallback(Ok(()))
    }

    /// 总是被考生拒绝
    pub fn declining() -> Self {
        Self::with_fallback(Err(FullscreenFailure::Declined))
    }

    /// 总是无法提供全屏
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::with_fallback(Err(FullscreenFailure::Unavailable(reason.into())))
    }

    /// 追加一次全屏请求的结果，用完后回落到默认结果
    pub fn then(self, result: Result<(), FullscreenFailure>) -> Self {
        self.lock_queue().push_back(result);
        self
    }

    /// 模拟全屏请求的耗时
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn enter_calls(&self) -> usize {
        self.enter_calls.load(Ordering::SeqCst)
    }

    pub fn exit_calls(&self) -> usize {
        self.exit_calls.load(Ordering::SeqCst)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<(), FullscreenFailure>>> {
        self.queued.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Environment for ScriptedEnvironment {
    async fn enter_fullscreen(&self) -> Result<(), FullscreenFailure> {
        self.enter_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self
            .lock_queue()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        debug!("脚本环境全屏请求结果: {:?}", result);
        result
    }

    async fn exit_fullscreen(&self) -> Result<(), FullscreenFailure> {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 从通道转发信号的来源
///
/// 只能被挂载一次；挂载任务被中止后发送端会看到通道关闭。
/// 挂载前积压在通道里的信号发生在监视开始之前，挂载时直接丢弃。
#[derive(Debug)]
pub struct ChannelSignalSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<EnvSignal>>>,
}

impl ChannelSignalSource {
    /// 返回 (来源, 发送端)
    pub fn new() -> (Self, mpsc::UnboundedSender<EnvSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl SignalSource for ChannelSignalSource {
    fn attach(&self, sink: SignalSink) -> JoinHandle<()> {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(rx) = rx.as_mut() {
            let mut stale = 0usize;
            while rx.try_recv().is_ok() {
                stale += 1;
            }
            if stale > 0 {
                debug!("丢弃监视开始前的 {} 个信号", stale);
            }
        }
        tokio::spawn(async move {
            let Some(mut rx) = rx else {
                debug!("信号来源已经挂载过，忽略");
                return;
            };
            while let Some(signal) = rx.recv().await {
                if !sink.emit(signal) {
                    break;
                }
            }
        })
    }
}
