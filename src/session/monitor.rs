//! 监考完整性监视器
//!
//! 跟踪页面可见性与全屏状态两路信号，只在监视激活时计数违规。
//! 计数器只增不减，只有绑定新身份时才会清零。

/// 一次被计数的违规
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// 切换标签页或窗口被隐藏
    TabHidden { count: u32 },
    /// 退出了全屏
    FullscreenExit { count: u32 },
}

/// 纠正性重新进入全屏的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReentryStatus {
    /// 已恢复全屏
    Restored,
    /// 本次尝试失败
    Failed { consecutive_failures: u32 },
    /// 连续失败次数达到上限，需要人工介入
    Escalated { consecutive_failures: u32 },
}

#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    active: bool,
    fullscreen: bool,
    hidden: bool,
    tab_switch_count: u32,
    fullscreen_exit_count: u32,
    consecutive_reentry_failures: u32,
    max_reentry_failures: u32,
}

impl IntegrityMonitor {
    pub fn new(max_reentry_failures: u32) -> Self {
        Self {
            active: false,
            fullscreen: false,
            hidden: false,
            tab_switch_count: 0,
            fullscreen_exit_count: 0,
            consecutive_reentry_failures: 0,
            max_reentry_failures: max_reentry_failures.max(1),
        }
    }

    /// 开始监视，此时环境已处于全屏
    pub fn arm(&mut self) {
        self.active = true;
        self.fullscreen = true;
        self.hidden = false;
        self.consecutive_reentry_failures = 0;
    }

    /// 停止计数，之后的信号只更新观测状态
    pub fn disarm(&mut self) {
        self.active = false;
    }

    /// 暂停 / 恢复计数，不影响观测状态
    pub fn set_counting(&mut self, counting: bool) {
        self.active = counting;
    }

    /// 为新身份清零
    pub fn reset_for_new_identity(&mut self) {
        self.active = false;
        self.fullscreen = false;
        self.hidden = false;
        self.tab_switch_count = 0;
        self.fullscreen_exit_count = 0;
        self.consecutive_reentry_failures = 0;
    }

    /// 观测到可见性变化，只在 可见→隐藏 的转换上计数一次
    pub fn observe_visibility(&mut self, hidden: bool) -> Option<Violation> {
        let became_hidden = hidden && !self.hidden;
        self.hidden = hidden;

        if became_hidden && self.active {
            self.tab_switch_count += 1;
            return Some(Violation::TabHidden {
                count: self.tab_switch_count,
            });
        }
        None
    }

    /// 观测到全屏状态变化，只在 全屏→非全屏 的转换上计数一次
    pub fn observe_fullscreen(&mut self, fullscreen: bool) -> Option<Violation> {
        let exited = self.fullscreen && !fullscreen;
        self.fullscreen = fullscreen;

        if fullscreen {
            self.consecutive_reentry_failures = 0;
        }

        if exited && self.active {
            self.fullscreen_exit_count += 1;
            return Some(Violation::FullscreenExit {
                count: self.fullscreen_exit_count,
            });
        }
        None
    }

    /// 记录一次纠正性重新进入全屏的结果
    pub fn record_reentry(&mut self, succeeded: bool) -> ReentryStatus {
        if succeeded {
            self.fullscreen = true;
            self.consecutive_reentry_failures = 0;
            return ReentryStatus::Restored;
        }

        self.consecutive_reentry_failures += 1;
        if self.consecutive_reentry_failures >= self.max_reentry_failures {
            ReentryStatus::Escalated {
                consecutive_failures: self.consecutive_reentry_failures,
            }
        } else {
            ReentryStatus::Failed {
                consecutive_failures: self.consecutive_reentry_failures,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn tab_switch_count(&self) -> u32 {
        self.tab_switch_count
    }

    pub fn fullscreen_exit_count(&self) -> u32 {
        self.fullscreen_exit_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_only_when_active() {
        let mut monitor = IntegrityMonitor::new(3);
        assert_eq!(monitor.observe_visibility(true), None);
        assert_eq!(monitor.observe_visibility(false), None);
        assert_eq!(monitor.tab_switch_count(), 0);

        monitor.arm();
        assert_eq!(
            monitor.observe_visibility(true),
            Some(Violation::TabHidden { count: 1 })
        );
    }

    #[test]
    fn test_one_count_per_hidden_transition() {
        let mut monitor = IntegrityMonitor::new(3);
        monitor.arm();

        monitor.observe_visibility(true);
        // 持续隐藏不会重复计数
        assert_eq!(monitor.observe_visibility(true), None);
        assert_eq!(monitor.observe_visibility(true), None);
        monitor.observe_visibility(false);
        monitor.observe_visibility(true);

        assert_eq!(monitor.tab_switch_count(), 2);
    }

    #[test]
    fn test_one_count_per_fullscreen_exit() {
        let mut monitor = IntegrityMonitor::new(3);
        monitor.arm();

        assert_eq!(
            monitor.observe_fullscreen(false),
            Some(Violation::FullscreenExit { count: 1 })
        );
        assert_eq!(monitor.observe_fullscreen(false), None);
        monitor.observe_fullscreen(true);
        monitor.observe_fullscreen(false);
        assert_eq!(monitor.fullscreen_exit_count(), 2);
        assert_eq!(monitor.tab_switch_count(), 0);
    }

    #[test]
    fn test_disarm_keeps_counts() {
        let mut monitor = IntegrityMonitor::new(3);
        monitor.arm();
        monitor.observe_visibility(true);
        monitor.disarm();
        monitor.observe_visibility(false);
        monitor.observe_visibility(true);

        assert_eq!(monitor.tab_switch_count(), 1);
        assert!(monitor.is_hidden());
    }

    #[test]
    fn test_reentry_escalates_after_limit() {
        let mut monitor = IntegrityMonitor::new(2);
        monitor.arm();
        monitor.observe_fullscreen(false);

        assert_eq!(
            monitor.record_reentry(false),
            ReentryStatus::Failed {
                consecutive_failures: 1
            }
        );
        assert_eq!(
            monitor.record_reentry(false),
            ReentryStatus::Escalated {
                consecutive_failures: 2
            }
        );
        assert_eq!(monitor.record_reentry(true), ReentryStatus::Restored);
        assert!(monitor.is_fullscreen());
        assert_eq!(
            monitor.record_reentry(false),
            ReentryStatus::Failed {
                consecutive_failures: 1
            }
        );
    }

    #[test]
    fn test_reset_for_new_identity() {
        let mut monitor = IntegrityMonitor::new(3);
        monitor.arm();
        monitor.observe_visibility(true);
        monitor.observe_fullscreen(false);
        monitor.reset_for_new_identity();

        assert_eq!(monitor.tab_switch_count(), 0);
        assert_eq!(monitor.fullscreen_exit_count(), 0);
        assert!(!monitor.is_active());
    }
}
