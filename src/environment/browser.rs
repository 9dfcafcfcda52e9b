//! 浏览器考试环境
//!
//! 通过 `JsExecutor` 在考试页面里请求 / 退出全屏，并用轮询探针读取
//! 页面内监听器累计的可见性、全屏和关闭页面事件。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{EnvSignal, Environment, FullscreenFailure, SignalSink, SignalSource};
use crate::infrastructure::JsExecutor;

const ENTER_FULLSCREEN_JS: &str = r#"
(async () => {
    try {
        if (!document.fullscreenElement) {
            await document.documentElement.requestFullscreen();
        }
        return { ok: true };
    } catch (error) {
        return { ok: false, name: error.name || "Error", message: String(error.message || error) };
    }
})()
"#;

const EXIT_FULLSCREEN_JS: &str = r#"
(async () => {
    try {
        if (document.fullscreenElement) {
            await document.exitFullscreen();
        }
        return { ok: true };
    } catch (error) {
        return { ok: false, name: error.name || "Error", message: String(error.message || error) };
    }
})()
"#;

const INSTALL_LISTENERS_JS: &str = r#"
(() => {
    if (window.__proctor) {
        window.__proctor.armed = true;
        return true;
    }
    const state = {
        armed: true,
        hiddenEvents: 0,
        fullscreenExits: 0,
        unloadAttempts: 0,
        handlers: {},
    };
    let wasFullscreen = !!document.fullscreenElement;
    state.handlers.visibility = () => {
        if (state.armed && document.hidden) {
            state.hiddenEvents += 1;
        }
    };
    state.handlers.fullscreen = () => {
        const now = !!document.fullscreenElement;
        if (state.armed && wasFullscreen && !now) {
            state.fullscreenExits += 1;
        }
        wasFullscreen = now;
    };
    state.handlers.beforeunload = (event) => {
        if (!state.armed) {
            return;
        }
        state.unloadAttempts += 1;
        event.preventDefault();
        event.returnValue = '';
    };
    document.addEventListener('visibilitychange', state.handlers.visibility);
    document.addEventListener('fullscreenchange', state.handlers.fullscreen);
    window.addEventListener('beforeunload', state.handlers.beforeunload);
    window.__proctor = state;
    return true;
})()
"#;

/// 停止监视：解除关闭页面的拦截并移除全部监听器
const TEARDOWN_LISTENERS_JS: &str = r#"
(() => {
    const state = window.__proctor;
    if (!state) {
        return false;
    }
    state.armed = false;
    document.removeEventListener('visibilitychange', state.handlers.visibility);
    document.removeEventListener('fullscreenchange', state.handlers.fullscreen);
    window.removeEventListener('beforeunload', state.handlers.beforeunload);
    delete window.__proctor;
    return true;
})()
"#;

const SNAPSHOT_JS: &str = r#"
(() => {
    const s = window.__proctor || { hiddenEvents: 0, fullscreenExits: 0, unloadAttempts: 0 };
    return {
        hidden: document.hidden,
        fullscreen: !!document.fullscreenElement,
        hiddenEvents: s.hiddenEvents,
        fullscreenExits: s.fullscreenExits,
        unloadAttempts: s.unloadAttempts,
    };
})()
"#;

/// 页面内脚本的返回
#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    ok: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ScriptOutcome {
    fn into_result(self) -> Result<(), FullscreenFailure> {
        if self.ok {
            return Ok(());
        }
        let message = self.message.unwrap_or_default();
        match self.name.as_deref() {
            // 权限被拒绝视为考生拒绝，其余都是环境问题
            Some("NotAllowedError") => Err(FullscreenFailure::Declined),
            Some(name) => Err(FullscreenFailure::Unavailable(format!("{}: {}", name, message))),
            None => Err(FullscreenFailure::Unavailable(message)),
        }
    }
}

fn parse_outcome(value: JsonValue) -> Result<(), FullscreenFailure> {
    serde_json::from_value::<ScriptOutcome>(value)
        .map_err(|e| FullscreenFailure::Unavailable(format!("无法解析脚本返回: {}", e)))?
        .into_result()
}

/// 浏览器全屏能力
pub struct BrowserEnvironment {
    executor: JsExecutor,
}

impl BrowserEnvironment {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Environment for BrowserEnvironment {
    async fn enter_fullscreen(&self) -> Result<(), FullscreenFailure> {
        debug!("请求页面进入全屏");
        let value = self
            .executor
            .eval_with_gesture(ENTER_FULLSCREEN_JS)
            .await
            .map_err(|e| FullscreenFailure::Unavailable(e.to_string()))?;
        parse_outcome(value)
    }

    async fn exit_fullscreen(&self) -> Result<(), FullscreenFailure> {
        debug!("请求页面退出全屏");
        let value = self
            .executor
            .eval_with_gesture(EXIT_FULLSCREEN_JS)
            .await
            .map_err(|e| FullscreenFailure::Unavailable(e.to_string()))?;
        parse_outcome(value)
    }
}

/// 页面状态快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub hidden: bool,
    pub fullscreen: bool,
    pub hidden_events: u64,
    pub fullscreen_exits: u64,
    pub unload_attempts: u64,
}

/// 比较两次快照，还原期间发生的信号
///
/// 页面内监听器累计了转换次数，所以两次轮询之间的多次切换也不会丢失。
pub fn diff_snapshots(prev: &PageSnapshot, next: &PageSnapshot) -> Vec<EnvSignal> {
    let mut signals = Vec::new();

    let new_hidden = next.hidden_events.saturating_sub(prev.hidden_events);
    for i in 0..new_hidden {
        signals.push(EnvSignal::Visibility { hidden: true });
        if i + 1 < new_hidden || !next.hidden {
            signals.push(EnvSignal::Visibility { hidden: false });
        }
    }
    if new_hidden == 0 && next.hidden != prev.hidden {
        signals.push(EnvSignal::Visibility {
            hidden: next.hidden,
        });
    }

    let new_exits = next.fullscreen_exits.saturating_sub(prev.fullscreen_exits);
    for i in 0..new_exits {
        signals.push(EnvSignal::Fullscreen { active: false });
        if i + 1 < new_exits || next.fullscreen {
            signals.push(EnvSignal::Fullscreen { active: true });
        }
    }
    if new_exits == 0 && next.fullscreen != prev.fullscreen {
        signals.push(EnvSignal::Fullscreen {
            active: next.fullscreen,
        });
    }

    for _ in 0..next.unload_attempts.saturating_sub(prev.unload_attempts) {
        signals.push(EnvSignal::Unload);
    }

    signals
}

/// 页面轮询探针
pub struct BrowserProbe {
    executor: JsExecutor,
    interval: Duration,
}

impl BrowserProbe {
    pub fn new(executor: JsExecutor, interval: Duration) -> Self {
        Self { executor, interval }
    }
}

impl SignalSource for BrowserProbe {
    fn attach(&self, sink: SignalSink) -> JoinHandle<()> {
        let executor = self.executor.clone();
        let period = self.interval;

        tokio::spawn(async move {
            if let Err(e) = executor.eval(INSTALL_LISTENERS_JS).await {
                warn!("⚠️ 无法在页面安装监考监听器: {}", e);
                return;
            }
            info!("👁️ 监考探针已挂载，轮询间隔 {:?}", period);

            let mut last: Option<PageSnapshot> = None;
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let snapshot = match executor.eval_as::<PageSnapshot>(SNAPSHOT_JS).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!("读取页面状态失败: {}", e);
                        continue;
                    }
                };

                if let Some(prev) = &last {
                    for signal in diff_snapshots(prev, &snapshot) {
                        debug!("页面信号: {:?}", signal);
                        if !sink.emit(signal) {
                            return;
                        }
                    }
                }
                last = Some(snapshot);
            }
        })
    }

    fn detach(&self) {
        let executor = self.executor.clone();
        tokio::spawn(async move {
            match executor.eval(TEARDOWN_LISTENERS_JS).await {
                Ok(_) => info!("👁️ 监考监听器已移除，页面可以正常关闭"),
                Err(e) => warn!("⚠️ 移除监考监听器失败: {}", e),
            }
        });
    }
}
