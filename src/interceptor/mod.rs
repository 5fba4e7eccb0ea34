//! gRPC 客户端重试拦截器
//!
//! [`RetryInterceptor`] 持有基础重试配置，每次调用时把调用级覆盖合并到一份
//! 新的拷贝上，然后驱动一元重试循环或流式重试代理。

mod common;
pub mod stream;
mod unary;

pub use common::RETRY_COUNT_KEY;
pub use stream::RetryStream;

use crate::retry::{RetryCallOption, RetryOption};

/// 重试拦截器
#[derive(Debug, Clone, Default)]
pub struct RetryInterceptor {
    option: RetryOption,
}

impl RetryInterceptor {
    pub fn new(option: RetryOption) -> Self {
        Self { option }
    }

    /// 在默认配置上应用覆盖后创建拦截器
    pub fn with_call_options(options: Vec<RetryCallOption>) -> Self {
        Self::new(RetryOption::default().merge(&options))
    }

    /// 基础配置
    pub fn option(&self) -> &RetryOption {
        &self.option
    }
}
