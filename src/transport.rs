//! 传输层抽象
//!
//! 重试模块不实现传输，只通过这里的 trait 调用一元 invoker 和流式 streamer。

use crate::context::CallContext;
use crate::retry::RetryCallOption;
use async_trait::async_trait;
use std::time::Duration;
use tonic::Status;
use tonic::metadata::MetadataMap;

/// 流描述
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDesc {
    pub stream_name: String,
    /// 客户端是否会发送多条消息
    pub client_streams: bool,
    /// 服务端是否会返回多条消息
    pub server_streams: bool,
}

impl StreamDesc {
    /// 服务端流
    pub fn server_streaming(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            client_streams: false,
            server_streams: true,
        }
    }

    /// 双向流
    pub fn bidi_streaming(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            client_streams: true,
            server_streams: true,
        }
    }
}

/// 调用选项
///
/// `Retry` 在进入传输层之前被剥离，其余选项原样转发。
#[derive(Debug, Clone)]
pub enum CallOption {
    Retry(RetryCallOption),
    Timeout(Duration),
    Metadata { key: String, value: String },
    MaxResponseSize(usize),
}

impl From<RetryCallOption> for CallOption {
    fn from(option: RetryCallOption) -> Self {
        CallOption::Retry(option)
    }
}

/// 拆分出重试选项，返回（传输选项，重试选项）
pub fn split_call_options(options: Vec<CallOption>) -> (Vec<CallOption>, Vec<RetryCallOption>) {
    let mut transport = Vec::with_capacity(options.len());
    let mut retry = Vec::new();
    for option in options {
        match option {
            CallOption::Retry(option) => retry.push(option),
            other => transport.push(other),
        }
    }
    (transport, retry)
}

/// 一元调用 invoker
#[async_trait]
pub trait UnaryInvoker<Req, Resp>: Send + Sync
where
    Req: Send + Sync,
    Resp: Send,
{
    async fn invoke(
        &self,
        ctx: CallContext,
        method: &str,
        request: &Req,
        options: &[CallOption],
    ) -> Result<Resp, Status>;
}

/// 客户端流句柄
///
/// 所有方法都只借用 `&self`，上层可以在不同任务中并发发送、接收和关闭。
/// `recv_msg` 返回 `Ok(None)` 表示流正常结束。
#[async_trait]
pub trait ClientStream<Req, Resp>: Send + Sync
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn send_msg(&self, message: Req) -> Result<(), Status>;

    async fn recv_msg(&self) -> Result<Option<Resp>, Status>;

    async fn close_send(&self) -> Result<(), Status>;

    async fn header(&self) -> Result<MetadataMap, Status>;

    fn trailer(&self) -> MetadataMap;
}

/// 流式调用 streamer
#[async_trait]
pub trait Streamer<Req, Resp>: Send + Sync
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn new_stream(
        &self,
        ctx: CallContext,
        desc: &StreamDesc,
        method: &str,
        options: &[CallOption],
    ) -> Result<Box<dyn ClientStream<Req, Resp>>, Status>;
}
