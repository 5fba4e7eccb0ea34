//! 错误分类
//!
//! 任何能给出 gRPC 状态码的错误都可以参与分类。

use super::RetryOption;
use crate::context::ContextError;
use crate::error::RetryError;
use tonic::{Code, Status};

/// 能报告 gRPC 状态码的错误
pub trait StatusCoded {
    fn status_code(&self) -> Code;
}

impl StatusCoded for Status {
    fn status_code(&self) -> Code {
        self.code()
    }
}

impl StatusCoded for Code {
    fn status_code(&self) -> Code {
        *self
    }
}

impl StatusCoded for ContextError {
    fn status_code(&self) -> Code {
        match self {
            ContextError::Canceled => Code::Cancelled,
            ContextError::DeadlineExceeded => Code::DeadlineExceeded,
        }
    }
}

impl StatusCoded for RetryError {
    fn status_code(&self) -> Code {
        match self {
            RetryError::InvalidConfig(_) | RetryError::UnknownCode(_) => Code::InvalidArgument,
            RetryError::Io(_) | RetryError::Parse(_) => Code::Internal,
        }
    }
}

/// 是否为上下文错误（超时或取消）
///
/// 上下文错误来自调用方，本身从不重试。
pub fn is_context_error<E: StatusCoded + ?Sized>(err: &E) -> bool {
    matches!(err.status_code(), Code::DeadlineExceeded | Code::Cancelled)
}

/// 按重试选项判断错误是否可重试
pub fn is_retriable<E: StatusCoded + ?Sized>(err: &E, option: &RetryOption) -> bool {
    if is_context_error(err) {
        return false;
    }
    option.codes().contains(&err.status_code())
}
