//! 重试策略模块
//!
//! - 退避函数：[`Linear`]、[`LinearJitter`]、[`Exponential`]、[`ExponentialJitter`]
//! - 错误分类：[`is_context_error`]、[`is_retriable`]
//! - 重试选项：[`RetryOption`] 与调用级覆盖 [`RetryCallOption`]

pub mod classify;
pub mod exponential;
pub mod linear;
pub mod options;

pub use classify::{StatusCoded, is_context_error, is_retriable};
pub use exponential::{Exponential, ExponentialJitter};
pub use linear::{Linear, LinearJitter};
pub use options::{DEFAULT_RETRIABLE_CODES, RetryCallOption, RetryOption};

use std::time::Duration;

/// 退避策略 trait
///
/// `attempt` 从 0 开始计数；第一次传输尝试不会等待，
/// 只有发生过失败之后才会以当前尝试序号调用。
pub trait BackoffPolicy: Send + Sync {
    fn backoff_duration(&self, attempt: u32) -> Duration;
}

impl<F> BackoffPolicy for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn backoff_duration(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// 给时长加上随机抖动
///
/// 结果落在 `[duration * (1 - jitter), duration * (1 + jitter)]`，
/// 例如 10s、抖动 0.1 得到 9s 到 11s 之间的值。
pub fn jitter_up(duration: Duration, jitter: f64) -> Duration {
    let multiplier = jitter * (rand::random::<f64>() * 2.0 - 1.0);
    let factor = (1.0 + multiplier).max(0.0);
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// 计算 2^(a-1)，`a == 0` 时为 0，溢出时饱和
pub fn exponent_base2(a: u32) -> u32 {
    if a == 0 {
        return 0;
    }
    1u32.checked_shl(a - 1).unwrap_or(u32::MAX)
}
