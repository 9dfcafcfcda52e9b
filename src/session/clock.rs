//! 倒计时时钟
//!
//! 时钟本身不持有定时器，只在收到一次 tick 时减少一秒；
//! 1 Hz 的 tick 由会话运行时的后台任务产生，再经由控制器送到这里。

/// 剩余时间不超过该值时视为"时间不足"（5 分钟）
pub const LOW_TIME_THRESHOLD_SECS: u64 = 5 * 60;

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 时钟未运行，忽略
    Idle,
    /// 减少了一秒
    Ticked { remaining: u64 },
    /// 刚好归零，一次性的到期信号
    Expired,
}

/// 单调递减的整数秒倒计时
#[derive(Debug, Clone)]
pub struct Clock {
    remaining: u64,
    running: bool,
    expired: bool,
}

impl Clock {
    /// 创建一个未运行的时钟
    pub fn new(initial_seconds: u64) -> Self {
        Self {
            remaining: initial_seconds,
            running: false,
            expired: false,
        }
    }

    /// 从当前剩余时间开始计时，已到期的时钟必须先 reset
    pub fn start(&mut self) {
        if !self.expired && self.remaining > 0 {
            self.running = true;
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// 重新初始化，重新装填到期信号
    pub fn reset(&mut self, initial_seconds: u64) {
        self.remaining = initial_seconds;
        self.running = false;
        self.expired = false;
    }

    /// 推进一秒
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            self.expired = true;
            return TickOutcome::Expired;
        }

        TickOutcome::Ticked {
            remaining: self.remaining,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn is_running_low(&self) -> bool {
        self.remaining <= LOW_TIME_THRESHOLD_SECS
    }

    /// 格式化为 MM:SS
    pub fn format(&self) -> String {
        format_seconds(self.remaining)
    }
}

pub fn format_seconds(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_until_started() {
        let mut clock = Clock::new(10);
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.remaining(), 10);

        clock.start();
        assert_eq!(clock.tick(), TickOutcome::Ticked { remaining: 9 });
    }

    #[test]
    fn test_pause_and_stop_freeze_time() {
        let mut clock = Clock::new(10);
        clock.start();
        clock.tick();
        clock.pause();
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.remaining(), 9);

        clock.start();
        clock.tick();
        clock.stop();
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.remaining(), 8);
    }

    #[test]
    fn test_expiry_fires_once() {
        let mut clock = Clock::new(2);
        clock.start();
        assert_eq!(clock.tick(), TickOutcome::Ticked { remaining: 1 });
        assert_eq!(clock.tick(), TickOutcome::Expired);
        assert!(clock.is_expired());
        assert!(!clock.is_running());

        // 到期后不再触发，也不会变成负数
        assert_eq!(clock.tick(), TickOutcome::Idle);
        clock.start();
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn test_reset_rearms_expiry() {
        let mut clock = Clock::new(1);
        clock.start();
        assert_eq!(clock.tick(), TickOutcome::Expired);

        clock.reset(1);
        assert!(!clock.is_expired());
        assert!(!clock.is_running());
        clock.start();
        assert_eq!(clock.tick(), TickOutcome::Expired);
    }

    #[test]
    fn test_zero_duration_never_runs() {
        let mut clock = Clock::new(0);
        clock.start();
        assert!(!clock.is_running());
        assert_eq!(clock.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_running_low_is_derived() {
        let mut clock = Clock::new(LOW_TIME_THRESHOLD_SECS + 1);
        assert!(!clock.is_running_low());
        clock.start();
        clock.tick();
        assert!(clock.is_running_low());
    }

    #[test]
    fn test_format() {
        assert_eq!(Clock::new(45 * 60).format(), "45:00");
        assert_eq!(format_seconds(65), "01:05");
        assert_eq!(format_seconds(0), "00:00");
    }
}
