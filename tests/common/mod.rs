//! 测试用的传输层模拟实现

#![allow(dead_code)]

use async_trait::async_trait;
use flare_grpc_retry::{
    CallContext, CallOption, ClientStream, RETRY_COUNT_KEY, StreamDesc, Streamer, UnaryInvoker,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tonic::Status;
use tonic::metadata::MetadataMap;

/// 每次调用从脚本中取出一个结果，脚本耗尽后重复最后一个
pub struct ScriptedInvoker {
    script: Mutex<VecDeque<Result<String, Status>>>,
    last: Mutex<Option<Result<String, Status>>>,
    calls: Mutex<Vec<CallContext>>,
}

impl ScriptedInvoker {
    pub fn new(script: Vec<Result<String, Status>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(result: Result<String, Status>) -> Self {
        Self::new(vec![result])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn retry_counts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|ctx| {
                ctx.metadata()
                    .get(RETRY_COUNT_KEY)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string()
            })
            .collect()
    }

    fn next(&self) -> Result<String, Status> {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match script.pop_front() {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(Status::internal("empty script"))),
        }
    }
}

#[async_trait]
impl UnaryInvoker<String, String> for ScriptedInvoker {
    async fn invoke(
        &self,
        ctx: CallContext,
        _method: &str,
        request: &String,
        _options: &[CallOption],
    ) -> Result<String, Status> {
        self.calls.lock().unwrap().push(ctx.clone());
        self.next().map(|resp| format!("{}:{}", request, resp))
    }
}

/// 一直阻塞到单次尝试的上下文结束
pub struct HangingInvoker {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl UnaryInvoker<String, String> for HangingInvoker {
    async fn invoke(
        &self,
        ctx: CallContext,
        _method: &str,
        _request: &String,
        _options: &[CallOption],
    ) -> Result<String, Status> {
        *self.calls.lock().unwrap() += 1;
        let err = ctx.done().await;
        Err(err.into())
    }
}

/// 单个模拟流的行为
#[derive(Clone)]
pub struct StreamScript {
    /// 依次返回的接收结果，耗尽后返回 Ok(None)
    pub recv: Vec<Result<Option<String>, Status>>,
}

pub struct MockStream {
    pub id: usize,
    pub sent: Mutex<Vec<String>>,
    pub closed: Mutex<bool>,
    /// 发送与关闭按发生顺序记录
    pub events: Mutex<Vec<String>>,
    recv: Mutex<VecDeque<Result<Option<String>, Status>>>,
}

#[async_trait]
impl ClientStream<String, String> for MockStream {
    async fn send_msg(&self, message: String) -> Result<(), Status> {
        self.events.lock().unwrap().push(format!("send:{}", message));
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv_msg(&self) -> Result<Option<String>, Status> {
        self.recv.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn close_send(&self) -> Result<(), Status> {
        self.events.lock().unwrap().push("close".to_string());
        *self.closed.lock().unwrap() = true;
        Ok(())
    }

    async fn header(&self) -> Result<MetadataMap, Status> {
        let mut header = MetadataMap::new();
        if let Ok(value) = self.id.to_string().parse() {
            header.insert("x-stream-id", value);
        }
        Ok(header)
    }

    fn trailer(&self) -> MetadataMap {
        MetadataMap::new()
    }
}

/// 按顺序创建流：`Ok(script)` 建流成功，`Err(status)` 建流失败
pub struct MockStreamer {
    plan: Mutex<VecDeque<Result<StreamScript, Status>>>,
    pub streams: Mutex<Vec<Arc<MockStream>>>,
    pub new_stream_calls: Mutex<usize>,
}

impl MockStreamer {
    pub fn new(plan: Vec<Result<StreamScript, Status>>) -> Arc<Self> {
        Arc::new(Self {
            plan: Mutex::new(plan.into()),
            streams: Mutex::new(Vec::new()),
            new_stream_calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.new_stream_calls.lock().unwrap()
    }

    pub fn stream(&self, index: usize) -> Arc<MockStream> {
        Arc::clone(&self.streams.lock().unwrap()[index])
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }
}

/// 把共享的 MockStream 包装成可装箱的句柄
struct SharedStream(Arc<MockStream>);

#[async_trait]
impl ClientStream<String, String> for SharedStream {
    async fn send_msg(&self, message: String) -> Result<(), Status> {
        self.0.send_msg(message).await
    }

    async fn recv_msg(&self) -> Result<Option<String>, Status> {
        self.0.recv_msg().await
    }

    async fn close_send(&self) -> Result<(), Status> {
        self.0.close_send().await
    }

    async fn header(&self) -> Result<MetadataMap, Status> {
        self.0.header().await
    }

    fn trailer(&self) -> MetadataMap {
        self.0.trailer()
    }
}

#[async_trait]
impl Streamer<String, String> for MockStreamer {
    async fn new_stream(
        &self,
        _ctx: CallContext,
        _desc: &StreamDesc,
        _method: &str,
        _options: &[CallOption],
    ) -> Result<Box<dyn ClientStream<String, String>>, Status> {
        *self.new_stream_calls.lock().unwrap() += 1;
        let next = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Status::internal("no more streams planned")));
        let script = next?;

        let mut streams = self.streams.lock().unwrap();
        let stream = Arc::new(MockStream {
            id: streams.len(),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            events: Mutex::new(Vec::new()),
            recv: Mutex::new(script.recv.into()),
        });
        streams.push(Arc::clone(&stream));
        Ok(Box::new(SharedStream(stream)))
    }
}

pub fn ok_stream(recv: Vec<Result<Option<String>, Status>>) -> Result<StreamScript, Status> {
    Ok(StreamScript { recv })
}

/// 在第 `hold_call` 次建流时停住，直到测试放行
pub struct GatedStreamer {
    pub inner: Arc<MockStreamer>,
    hold_call: usize,
    calls: Mutex<usize>,
    /// 进入被停住的建流时通知
    pub entered: Notify,
    /// 放行被停住的建流
    pub release: Notify,
}

impl GatedStreamer {
    pub fn new(inner: Arc<MockStreamer>, hold_call: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            hold_call,
            calls: Mutex::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Streamer<String, String> for GatedStreamer {
    async fn new_stream(
        &self,
        ctx: CallContext,
        desc: &StreamDesc,
        method: &str,
        options: &[CallOption],
    ) -> Result<Box<dyn ClientStream<String, String>>, Status> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if call == self.hold_call {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.new_stream(ctx, desc, method, options).await
    }
}
