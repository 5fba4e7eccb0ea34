//! gRPC 状态码与名称之间的转换
//!
//! 配置文件里的可重试状态码使用 `UNAVAILABLE` 这样的名称（大小写不敏感），
//! 也接受数字形式。

use super::{Result, RetryError};
use tonic::Code;

const ALL_CODES: [Code; 17] = [
    Code::Ok,
    Code::Cancelled,
    Code::Unknown,
    Code::InvalidArgument,
    Code::DeadlineExceeded,
    Code::NotFound,
    Code::AlreadyExists,
    Code::PermissionDenied,
    Code::ResourceExhausted,
    Code::FailedPrecondition,
    Code::Aborted,
    Code::OutOfRange,
    Code::Unimplemented,
    Code::Internal,
    Code::Unavailable,
    Code::DataLoss,
    Code::Unauthenticated,
];

/// 获取状态码的标准名称
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}

/// 从名称或数字解析状态码
///
/// `"unavailable"`、`"UNAVAILABLE"` 和 `"14"` 都会得到 `Code::Unavailable`，
/// `"CANCELED"` 作为 `"CANCELLED"` 的别名。
pub fn code_from_name(name: &str) -> Result<Code> {
    let trimmed = name.trim();

    if let Ok(value) = trimmed.parse::<i32>() {
        return ALL_CODES
            .iter()
            .copied()
            .find(|code| *code as i32 == value)
            .ok_or_else(|| RetryError::UnknownCode(name.to_string()));
    }

    let normalized = trimmed.to_ascii_uppercase().replace(['-', ' '], "_");
    if normalized == "CANCELED" {
        return Ok(Code::Cancelled);
    }

    ALL_CODES
        .iter()
        .copied()
        .find(|code| code_name(*code) == normalized)
        .ok_or_else(|| RetryError::UnknownCode(name.to_string()))
}
