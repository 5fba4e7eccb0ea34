//! 错误到 gRPC Status 的转换

use super::RetryError;
use tonic::Status;

impl From<RetryError> for Status {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::InvalidConfig(_) | RetryError::UnknownCode(_) => {
                Status::invalid_argument(err.to_string())
            }
            RetryError::Io(_) | RetryError::Parse(_) => Status::internal(err.to_string()),
        }
    }
}
