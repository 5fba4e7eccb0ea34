//! 重试观测事件
//!
//! 重试循环只向 [`Event`] 写入计数和耗时，不依赖任何指标系统；
//! 默认使用 [`NoopEvent`]，需要统计时换成 [`MetricsEvent`] 或自定义实现。

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tonic::{Code, Status};

/// 最大尝试次数（每次调用设置一次）
pub const RETRY_MAX_ATTEMPTS: &str = "retry_max_attempts";
/// 一元调用 / 建流阶段的重试次数
pub const RETRY_COUNT: &str = "retry_count";
/// 流式接收阶段的重试次数
pub const RETRY_COUNT_RECV_MSG: &str = "retry_count_recv_msg";
/// 每次尝试前的退避等待时间
pub const RETRY_WAIT: &str = "retry_wait";

/// 观测事件 trait
pub trait Event: Send + Sync {
    fn set_counter(&self, name: &str, value: i64);
    fn increment_counter(&self, name: &str, delta: i64);
    fn record_duration(&self, name: &str, duration: Duration);
    fn add_error(&self, error: &Status);
}

/// 空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvent;

impl Event for NoopEvent {
    fn set_counter(&self, _name: &str, _value: i64) {}

    fn increment_counter(&self, _name: &str, _delta: i64) {}

    fn record_duration(&self, _name: &str, _duration: Duration) {}

    fn add_error(&self, _error: &Status) {}
}

/// 事件数据快照
#[derive(Debug, Clone, Default)]
pub struct EventMetrics {
    pub counters: HashMap<String, i64>,
    pub durations: HashMap<String, Vec<Duration>>,
    pub errors: Vec<Code>,
}

impl EventMetrics {
    /// 获取计数器的值，不存在时为 0
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// 获取某个名称下记录的全部耗时
    pub fn durations(&self, name: &str) -> &[Duration] {
        self.durations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 内存事件收集器
///
/// 克隆出的句柄共享同一份数据，可以把一个副本放进 `CallContext`，
/// 另一个留给调用方读取。
#[derive(Clone, Default)]
pub struct MetricsEvent {
    metrics: Arc<RwLock<EventMetrics>>,
}

impl MetricsEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> EventMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut EventMetrics)) {
        let mut metrics = self
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut metrics);
    }
}

impl Event for MetricsEvent {
    fn set_counter(&self, name: &str, value: i64) {
        self.update(|m| {
            m.counters.insert(name.to_string(), value);
        });
    }

    fn increment_counter(&self, name: &str, delta: i64) {
        self.update(|m| {
            *m.counters.entry(name.to_string()).or_insert(0) += delta;
        });
    }

    fn record_duration(&self, name: &str, duration: Duration) {
        self.update(|m| {
            m.durations
                .entry(name.to_string())
                .or_default()
                .push(duration);
        });
    }

    fn add_error(&self, error: &Status) {
        self.update(|m| m.errors.push(error.code()));
    }
}
