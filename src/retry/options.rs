//! 重试选项
//!
//! [`RetryOption`] 在一次调用开始后不再变化。调用级的 [`RetryCallOption`]
//! 通过 [`RetryOption::merge`] 作用在一份拷贝上，基础配置保持不变，
//! 多个并发调用共享同一个基础配置也互不影响。

use super::{BackoffPolicy, LinearJitter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tonic::Code;

/// 默认可重试的状态码
pub const DEFAULT_RETRIABLE_CODES: [Code; 2] = [Code::ResourceExhausted, Code::Unavailable];

/// 默认退避：50ms，抖动 10%
const DEFAULT_BACKOFF_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_BACKOFF_JITTER: f64 = 0.10;

/// 重试选项
#[derive(Clone)]
pub struct RetryOption {
    max_attempts: u32,
    per_attempt_timeout: Duration,
    codes: Vec<Code>,
    backoff: Arc<dyn BackoffPolicy>,
}

impl Default for RetryOption {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            per_attempt_timeout: Duration::ZERO,
            codes: DEFAULT_RETRIABLE_CODES.to_vec(),
            backoff: Arc::new(LinearJitter::new(
                DEFAULT_BACKOFF_INTERVAL,
                DEFAULT_BACKOFF_JITTER,
            )),
        }
    }
}

impl RetryOption {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最大尝试次数，0 表示关闭重试
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 单次尝试超时，0 表示不限制
    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    pub fn backoff(&self) -> &dyn BackoffPolicy {
        self.backoff.as_ref()
    }

    /// 第 `attempt` 次尝试前的等待时间
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.backoff.backoff_duration(attempt)
    }

    pub fn is_disabled(&self) -> bool {
        self.max_attempts == 0
    }

    /// 应用调用级覆盖，返回新的选项
    #[must_use]
    pub fn merge(&self, overrides: &[RetryCallOption]) -> RetryOption {
        let mut merged = self.clone();
        for option in overrides {
            option.apply(&mut merged);
        }
        merged
    }

    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.max_attempts = max_attempts;
    }

    pub fn set_per_attempt_timeout(&mut self, timeout: Duration) {
        self.per_attempt_timeout = timeout;
    }

    pub fn set_codes(&mut self, codes: Vec<Code>) {
        self.codes = codes;
    }

    pub fn set_backoff(&mut self, backoff: Arc<dyn BackoffPolicy>) {
        self.backoff = backoff;
    }
}

impl fmt::Debug for RetryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOption")
            .field("max_attempts", &self.max_attempts)
            .field("per_attempt_timeout", &self.per_attempt_timeout)
            .field("codes", &self.codes)
            .finish_non_exhaustive()
    }
}

type ApplyFn = dyn Fn(&mut RetryOption) + Send + Sync;

/// 调用级重试选项
///
/// 可以放进 [`CallOption::Retry`](crate::transport::CallOption::Retry) 随单次调用传入，
/// 也可以在构造拦截器时作为默认覆盖。
#[derive(Clone)]
pub struct RetryCallOption {
    name: &'static str,
    apply: Arc<ApplyFn>,
}

impl RetryCallOption {
    /// 自定义覆盖
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&mut RetryOption) + Send + Sync + 'static,
    {
        Self {
            name: "custom",
            apply: Arc::new(f),
        }
    }

    /// 关闭重试，等价于 `with_max(0)`
    pub fn with_disable() -> Self {
        Self::with_max(0)
    }

    /// 设置最大尝试次数
    pub fn with_max(max_attempts: u32) -> Self {
        Self {
            name: "max_attempts",
            apply: Arc::new(move |opt| opt.set_max_attempts(max_attempts)),
        }
    }

    /// 设置退避策略
    pub fn with_backoff<B>(backoff: B) -> Self
    where
        B: BackoffPolicy + 'static,
    {
        let backoff: Arc<dyn BackoffPolicy> = Arc::new(backoff);
        Self {
            name: "backoff",
            apply: Arc::new(move |opt| opt.set_backoff(Arc::clone(&backoff))),
        }
    }

    /// 设置可重试的状态码
    pub fn with_codes(codes: impl IntoIterator<Item = Code>) -> Self {
        let codes: Vec<Code> = codes.into_iter().collect();
        Self {
            name: "codes",
            apply: Arc::new(move |opt| opt.set_codes(codes.clone())),
        }
    }

    /// 设置单次尝试超时
    pub fn with_per_retry_timeout(timeout: Duration) -> Self {
        Self {
            name: "per_retry_timeout",
            apply: Arc::new(move |opt| opt.set_per_attempt_timeout(timeout)),
        }
    }

    pub fn apply(&self, option: &mut RetryOption) {
        (self.apply)(option);
    }
}

impl fmt::Debug for RetryCallOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCallOption")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
