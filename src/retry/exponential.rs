use super::{BackoffPolicy, exponent_base2, jitter_up};
use std::time::Duration;

/// 指数退避策略
///
/// 等待时间为 `scalar * 2^(attempt-1)`：scalar 为 100ms 时，
/// 第 1 次重试等待 100ms，第 3 次 400ms，第 5 次 1.6s；`attempt == 0` 时不等待。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    scalar: Duration,
}

impl Exponential {
    pub fn new(scalar: Duration) -> Self {
        Self { scalar }
    }
}

impl BackoffPolicy for Exponential {
    fn backoff_duration(&self, attempt: u32) -> Duration {
        self.scalar.saturating_mul(exponent_base2(attempt))
    }
}

/// 带抖动的指数退避策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialJitter {
    scalar: Duration,
    jitter: f64,
}

impl ExponentialJitter {
    pub fn new(scalar: Duration, jitter: f64) -> Self {
        Self { scalar, jitter }
    }
}

impl BackoffPolicy for ExponentialJitter {
    fn backoff_duration(&self, attempt: u32) -> Duration {
        jitter_up(
            self.scalar.saturating_mul(exponent_base2(attempt)),
            self.jitter,
        )
    }
}
