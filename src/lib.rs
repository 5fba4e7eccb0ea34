//! Flare gRPC Retry
//!
//! gRPC 客户端重试：可配置的退避策略、错误分类、调用级覆盖，
//! 以及一元调用重试循环和流式调用重试代理。

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod interceptor;
pub mod logging;
pub mod retry;
pub mod transport;

// Re-exports
pub use config::{BackoffConfig, RetryConfig, RetryConfigFile, RetryOptionRegistry};
pub use context::{CallContext, ContextError};
pub use error::{Result, RetryError};
pub use event::{Event, EventMetrics, MetricsEvent, NoopEvent};
pub use interceptor::{RETRY_COUNT_KEY, RetryInterceptor, RetryStream};
pub use retry::*;
pub use transport::{CallOption, ClientStream, StreamDesc, Streamer, UnaryInvoker, split_call_options};
