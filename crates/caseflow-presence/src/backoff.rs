use std::time::Duration;

/// Probe schedule for the presence poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub visible_interval: Duration,
    pub hidden_interval: Duration,
    pub max_delay: Duration,
    pub degraded_after_failures: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            visible_interval: Duration::from_millis(2_500),
            hidden_interval: Duration::from_millis(8_000),
            max_delay: Duration::from_millis(30_000),
            degraded_after_failures: 3,
        }
    }
}

impl BackoffPolicy {
    pub fn base_interval(&self, visible: bool) -> Duration {
        if visible {
            self.visible_interval
        } else {
            self.hidden_interval
        }
    }

    /// `base` while healthy, `min(max_delay, base * 2^(failures - 1))` after failures.
    pub fn next_delay(&self, visible: bool, consecutive_failures: u32) -> Duration {
        let base = self.base_interval(visible);
        if consecutive_failures == 0 {
            return base;
        }
        let factor = 2u32.saturating_pow(consecutive_failures - 1);
        base.saturating_mul(factor).min(self.max_delay)
    }

    pub fn is_degraded(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.degraded_after_failures.max(1)
    }
}
