//! 调用上下文
//!
//! 每次 RPC 调用持有一个 [`CallContext`]：取消信号、可选的截止时间、
//! 待发送的元数据以及观测事件。重试时每次尝试都从父上下文派生出子上下文，
//! 父上下文取消会传播到子上下文，反之不会。

use crate::event::{Event, NoopEvent};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::metadata::MetadataMap;

/// 上下文结束原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl From<ContextError> for Status {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Status::cancelled(err.to_string()),
            ContextError::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
        }
    }
}

/// 调用上下文
#[derive(Clone)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    metadata: MetadataMap,
    event: Arc<dyn Event>,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            metadata: MetadataMap::new(),
            event: Arc::new(NoopEvent),
        }
    }

    /// 使用外部的取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// 设置截止时间
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 设置从现在开始的超时时间
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// 设置待发送的元数据
    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// 设置观测事件
    pub fn with_event(mut self, event: Arc<dyn Event>) -> Self {
        self.event = event;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// 取消当前上下文及其所有子上下文
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.metadata
    }

    pub fn event(&self) -> &dyn Event {
        self.event.as_ref()
    }

    /// 上下文已结束时返回结束原因
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// 等待上下文结束
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ContextError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// 在上下文结束前运行 future
    pub async fn run<F>(&self, future: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            output = future => Ok(output),
        }
    }

    /// 派生子上下文，继承截止时间、元数据和事件
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            metadata: self.metadata.clone(),
            event: Arc::clone(&self.event),
        }
    }

    /// 派生带超时的子上下文，截止时间取父上下文与 `now + timeout` 中较早者
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.child();
        let candidate = Instant::now() + timeout;
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(candidate),
            None => candidate,
        });
        child
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
