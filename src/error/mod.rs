//! 重试模块错误处理
//!
//! 配置解析、状态码解析等非传输错误统一使用 [`RetryError`]，
//! 传输错误仍然是 `tonic::Status`，两者之间的转换见 [`grpc`]。

pub mod code;
pub mod grpc;

pub use code::{code_from_name, code_name};

use thiserror::Error;

/// 重试模块错误类型
#[derive(Error, Debug)]
pub enum RetryError {
    /// 配置值不合法
    #[error("invalid retry config: {0}")]
    InvalidConfig(String),

    /// 无法识别的 gRPC 状态码名称
    #[error("unknown status code: {0}")]
    UnknownCode(String),

    /// 读取配置文件失败
    #[error("failed to read retry config: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件格式错误
    #[error("failed to parse retry config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RetryError {
    /// 创建配置错误
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        RetryError::InvalidConfig(reason.into())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, RetryError>;
