use super::RetryInterceptor;
use super::common::{attempt_context, should_retry, wait_retry_backoff};
use crate::context::CallContext;
use crate::event::{RETRY_COUNT, RETRY_MAX_ATTEMPTS};
use crate::transport::{CallOption, UnaryInvoker, split_call_options};
use tonic::Status;
use tracing::{debug, warn};

impl RetryInterceptor {
    /// 带重试的一元调用
    ///
    /// `options` 中的 [`CallOption::Retry`] 会覆盖拦截器的默认配置，
    /// 其余选项原样转发给 invoker。
    pub async fn unary<Req, Resp, I>(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &Req,
        invoker: &I,
        options: Vec<CallOption>,
    ) -> Result<Resp, Status>
    where
        Req: Send + Sync,
        Resp: Send,
        I: UnaryInvoker<Req, Resp> + ?Sized,
    {
        let (transport_options, retry_options) = split_call_options(options);
        let option = self.option().merge(&retry_options);
        let event = ctx.event();

        event.set_counter(RETRY_MAX_ATTEMPTS, i64::from(option.max_attempts()));
        if option.is_disabled() {
            return invoker
                .invoke(ctx.clone(), method, request, &transport_options)
                .await;
        }

        let mut last_err = None;
        for attempt in 0..option.max_attempts() {
            if attempt > 0 {
                event.increment_counter(RETRY_COUNT, 1);
            }

            if let Err(err) = wait_retry_backoff(attempt, ctx, &option).await {
                event.add_error(&err);
                return Err(err);
            }

            let attempt_ctx = attempt_context(ctx, &option, attempt);
            let err = match invoker
                .invoke(attempt_ctx, method, request, &transport_options)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            debug!(method, attempt, error = %err, "unary attempt failed");
            if !should_retry(&err, ctx, &option) {
                event.add_error(&err);
                return Err(err);
            }
            last_err = Some(err);
        }

        let err = last_err.unwrap_or_else(|| Status::internal("retry loop made no attempt"));
        warn!(
            method,
            attempts = option.max_attempts(),
            error = %err,
            "unary retry attempts exhausted"
        );
        event.add_error(&err);
        Err(err)
    }
}
