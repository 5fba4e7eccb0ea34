//! 一元与流式重试共用的逻辑

use crate::context::CallContext;
use crate::event::RETRY_WAIT;
use crate::retry::{RetryOption, is_context_error, is_retriable};
use tonic::Status;
use tracing::debug;

/// 每次尝试都会带上的元数据键，值为尝试序号
pub const RETRY_COUNT_KEY: &str = "x-retry-count";

/// 按退避策略等待
///
/// 第 0 次尝试不等待。等待期间父上下文结束则立即返回上下文错误。
pub(crate) async fn wait_retry_backoff(
    attempt: u32,
    ctx: &CallContext,
    option: &RetryOption,
) -> Result<(), Status> {
    let wait = if attempt > 0 {
        option.backoff_duration(attempt)
    } else {
        std::time::Duration::ZERO
    };
    ctx.event().record_duration(RETRY_WAIT, wait);

    if wait.is_zero() {
        return Ok(());
    }

    let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
    debug!(attempt, wait_ms, "retry backoff");
    let sleep = tokio::time::sleep(wait);
    tokio::select! {
        biased;
        err = ctx.done() => Err(err.into()),
        _ = sleep => Ok(()),
    }
}

/// 派生单次尝试的上下文：应用单次超时并写入尝试序号
pub(crate) fn attempt_context(ctx: &CallContext, option: &RetryOption, attempt: u32) -> CallContext {
    let mut attempt_ctx = if option.per_attempt_timeout().is_zero() {
        ctx.child()
    } else {
        ctx.child_with_timeout(option.per_attempt_timeout())
    };

    if let Ok(value) = attempt.to_string().parse() {
        attempt_ctx.metadata_mut().insert(RETRY_COUNT_KEY, value);
    }
    attempt_ctx
}

/// 一次失败之后是否应继续尝试
///
/// 上下文错误只有在父上下文仍然存活时（即单次尝试超时）才继续；
/// 其他错误按可重试状态码判断。
pub(crate) fn should_retry(err: &Status, ctx: &CallContext, option: &RetryOption) -> bool {
    if is_context_error(err) {
        if let Some(parent_err) = ctx.err() {
            debug!(error = %parent_err, "parent context done, giving up");
            return false;
        }
        debug!("attempt context expired, trying again");
        return true;
    }
    is_retriable(err, option)
}
