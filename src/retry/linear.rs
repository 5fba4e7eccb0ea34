use super::{BackoffPolicy, jitter_up};
use std::time::Duration;

/// 固定间隔退避
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    interval: Duration,
}

impl Linear {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl BackoffPolicy for Linear {
    fn backoff_duration(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

/// 带抖动的固定间隔退避
///
/// 例如间隔 1s、抖动 0.10 时等待时间在 900ms 到 1100ms 之间。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearJitter {
    interval: Duration,
    jitter: f64,
}

impl LinearJitter {
    pub fn new(interval: Duration, jitter: f64) -> Self {
        Self { interval, jitter }
    }
}

impl BackoffPolicy for LinearJitter {
    fn backoff_duration(&self, _attempt: u32) -> Duration {
        jitter_up(self.interval, self.jitter)
    }
}
