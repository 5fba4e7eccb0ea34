//! 流式调用重试
//!
//! 建流阶段与一元调用相同：按退避策略重复调用 streamer。建流成功后返回
//! [`RetryStream`] 代理，它缓存所有已发送的消息；在尚未成功接收过任何消息时，
//! 接收失败且可重试就重新建流、按原顺序重放缓存的消息（以及已发生的
//! `close_send`），然后在新流上重新接收。一旦成功接收过消息就不再重试，
//! 避免把已经交给调用方的结果重复投递。接收以错误结束后代理进入终止状态，
//! 之后的接收直接转发给当前的流。

use super::RetryInterceptor;
use super::common::{attempt_context, should_retry, wait_retry_backoff};
use crate::context::CallContext;
use crate::event::{RETRY_COUNT, RETRY_COUNT_RECV_MSG, RETRY_MAX_ATTEMPTS};
use crate::retry::RetryOption;
use crate::transport::{CallOption, ClientStream, StreamDesc, Streamer, split_call_options};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tonic::Status;
use tonic::metadata::MetadataMap;
use tracing::{debug, warn};

impl RetryInterceptor {
    /// 带重试的流式调用
    ///
    /// 重试关闭时直接返回底层流；客户端流（`desc.client_streams`）在开启重试时
    /// 直接以 `UNIMPLEMENTED` 拒绝，不会调用 streamer。
    pub async fn stream<Req, Resp, S>(
        &self,
        ctx: &CallContext,
        desc: &StreamDesc,
        method: &str,
        streamer: Arc<S>,
        options: Vec<CallOption>,
    ) -> Result<Box<dyn ClientStream<Req, Resp>>, Status>
    where
        Req: Clone + Send + Sync + 'static,
        Resp: Send + 'static,
        S: Streamer<Req, Resp> + 'static,
    {
        let (transport_options, retry_options) = split_call_options(options);
        let option = self.option().merge(&retry_options);
        let event = ctx.event();

        event.set_counter(RETRY_MAX_ATTEMPTS, i64::from(option.max_attempts()));
        if option.is_disabled() {
            return streamer
                .new_stream(ctx.clone(), desc, method, &transport_options)
                .await;
        }

        if desc.client_streams {
            return Err(Status::unimplemented(
                "cannot retry on client streams, disable retry for this call",
            ));
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
            let result = streamer
                .new_stream(attempt_ctx, desc, method, &transport_options)
                .await;
            let err = match result {
                Ok(stream) => {
                    let streamer: Arc<dyn Streamer<Req, Resp>> = streamer;
                    return Ok(Box::new(RetryStream {
                        state: RwLock::new(StreamState {
                            stream: Arc::from(stream),
                            buffered_sends: Vec::new(),
                            received_good: false,
                            closed_send: false,
                            terminal: false,
                        }),
                        ctx: ctx.clone(),
                        option,
                        streamer,
                        desc: desc.clone(),
                        method: method.to_string(),
                        call_options: transport_options,
                    }));
                }
                Err(err) => err,
            };

            debug!(method, attempt, error = %err, "stream attempt failed");
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
            "stream retry attempts exhausted"
        );
        event.add_error(&err);
        Err(err)
    }
}

struct StreamState<Req, Resp> {
    stream: Arc<dyn ClientStream<Req, Resp>>,
    buffered_sends: Vec<Req>,
    received_good: bool,
    closed_send: bool,
    /// 接收重试已经结束，不再重新建流
    terminal: bool,
}

/// 可重试的流代理
///
/// 所有可变状态由一把读写锁保护，锁只在内存更新期间持有，
/// 不会跨越任何传输调用。发送时在同一次写锁内追加缓存并取得当前流，
/// 换流也在写锁内完成，因此每条消息要么进入重放，要么直接发到新流上。
pub struct RetryStream<Req, Resp> {
    state: RwLock<StreamState<Req, Resp>>,
    ctx: CallContext,
    option: RetryOption,
    streamer: Arc<dyn Streamer<Req, Resp>>,
    desc: StreamDesc,
    method: String,
    call_options: Vec<CallOption>,
}

/// 一次接收的结果
enum RecvOutcome<Resp> {
    /// 成功、正常结束或不可重试的失败
    Done(Result<Option<Resp>, Status>),
    /// 可以重新建流后再试
    Retry(Status),
}

impl<Req, Resp> RetryStream<Req, Resp>
where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + 'static,
{
    fn read_state(&self) -> RwLockReadGuard<'_, StreamState<Req, Resp>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StreamState<Req, Resp>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_stream(&self) -> Arc<dyn ClientStream<Req, Resp>> {
        Arc::clone(&self.read_state().stream)
    }

    async fn recv_and_indicate_retry(&self) -> RecvOutcome<Resp> {
        let was_good = self.read_state().received_good;
        let stream = self.current_stream();

        match stream.recv_msg().await {
            Ok(message) => {
                self.write_state().received_good = true;
                RecvOutcome::Done(Ok(message))
            }
            // 之前已经成功接收过，重试不再介入
            Err(err) if was_good => RecvOutcome::Done(Err(err)),
            Err(err) => {
                if should_retry(&err, &self.ctx, &self.option) {
                    RecvOutcome::Retry(err)
                } else {
                    RecvOutcome::Done(Err(err))
                }
            }
        }
    }

    /// 建立新流，按原顺序重放缓存的消息后换上新流
    ///
    /// 重放期间其他任务仍可能发送或关闭，因此在写锁内确认没有遗漏后才换流，
    /// 否则补发新增的部分再确认一次。
    async fn reestablish(&self, attempt_ctx: CallContext) -> Result<(), Status> {
        let stream: Arc<dyn ClientStream<Req, Resp>> = Arc::from(
            self.streamer
                .new_stream(attempt_ctx, &self.desc, &self.method, &self.call_options)
                .await
                .inspect_err(|err| {
                    debug!(method = %self.method, error = %err, "failed redialing stream")
                })?,
        );

        let mut replayed = 0;
        let mut close_replayed = false;
        loop {
            let (pending, replay_close) = {
                let mut state = self.write_state();
                let pending = state.buffered_sends[replayed..].to_vec();
                let replay_close = state.closed_send && !close_replayed;
                if pending.is_empty() && !replay_close {
                    state.stream = Arc::clone(&stream);
                    return Ok(());
                }
                (pending, replay_close)
            };

            for message in pending {
                stream.send_msg(message).await.inspect_err(|err| {
                    debug!(method = %self.method, error = %err, "failed resending buffered message")
                })?;
                replayed += 1;
            }

            // close_send 之后不会再有新的发送，只需重放一次
            if replay_close {
                stream.close_send().await.inspect_err(|err| {
                    debug!(method = %self.method, error = %err, "failed replaying close_send")
                })?;
                close_replayed = true;
            }
        }
    }

    async fn recv_with_retry(&self) -> Result<Option<Resp>, Status> {
        let mut last_err = match self.recv_and_indicate_retry().await {
            RecvOutcome::Done(result) => return result,
            RecvOutcome::Retry(err) => err,
        };

        let event = self.ctx.event();
        // 第 0 次尝试是最初建立的流
        for attempt in 1..self.option.max_attempts() {
            event.increment_counter(RETRY_COUNT_RECV_MSG, 1);

            if let Err(err) = wait_retry_backoff(attempt, &self.ctx, &self.option).await {
                event.add_error(&err);
                return Err(err);
            }

            let attempt_ctx = attempt_context(&self.ctx, &self.option, attempt);
            if let Err(err) = self.reestablish(attempt_ctx).await {
                if !should_retry(&err, &self.ctx, &self.option) {
                    event.add_error(&err);
                    return Err(err);
                }
                last_err = err;
                continue;
            }

            last_err = match self.recv_and_indicate_retry().await {
                RecvOutcome::Done(result) => return result,
                RecvOutcome::Retry(err) => err,
            };
        }

        warn!(
            method = %self.method,
            attempts = self.option.max_attempts(),
            error = %last_err,
            "stream receive retry attempts exhausted"
        );
        event.add_error(&last_err);
        Err(last_err)
    }
}

#[async_trait]
impl<Req, Resp> ClientStream<Req, Resp> for RetryStream<Req, Resp>
where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + 'static,
{
    async fn send_msg(&self, message: Req) -> Result<(), Status> {
        let stream = {
            let mut state = self.write_state();
            if state.closed_send {
                return Err(Status::failed_precondition("send_msg called after close_send"));
            }
            state.buffered_sends.push(message.clone());
            Arc::clone(&state.stream)
        };
        stream.send_msg(message).await
    }

    async fn recv_msg(&self) -> Result<Option<Resp>, Status> {
        let terminal = self.read_state().terminal;
        if terminal {
            return self.current_stream().recv_msg().await;
        }

        let result = self.recv_with_retry().await;
        if result.is_err() {
            self.write_state().terminal = true;
        }
        result
    }

    async fn close_send(&self) -> Result<(), Status> {
        let stream = {
            let mut state = self.write_state();
            state.closed_send = true;
            Arc::clone(&state.stream)
        };
        stream.close_send().await
    }

    async fn header(&self) -> Result<MetadataMap, Status> {
        self.current_stream().header().await
    }

    fn trailer(&self) -> MetadataMap {
        self.current_stream().trailer()
    }
}
