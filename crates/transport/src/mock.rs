//! Mock 传输层
//!
//! 用于单元测试的 mock 实现：脚本化注入传输事件，支持注入打开失败与延迟。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    BinaryType, DialOptions, Payload, Socket, SocketOpener, TransportError, TransportEvent,
    TransportSender,
};
use tokio::sync::oneshot;
use tracing::{debug, Instrument};

/// 共享的 mock 状态
#[derive(Debug, Default)]
struct MockState {
    /// 当前连接的事件发送端
    events: Option<TransportSender>,
    /// 打开失败时返回的消息
    fail_with: Option<String>,
    /// 调用 open 的次数
    open_count: usize,
    /// 最近一次拨号参数
    last_dial: Option<DialOptions>,
    /// 最近一次设置的二进制类型
    binary_type: Option<BinaryType>,
    /// 客户端调用 close 的记录
    close_calls: Vec<(Option<u16>, Option<String>)>,
}

/// Mock socket opener
pub struct MockSocketOpener {
    state: Arc<Mutex<MockState>>,
    /// 打开前等待（用于取消场景）
    open_delay: Option<Duration>,
}

impl MockSocketOpener {
    /// 创建总是成功的 opener
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            open_delay: None,
        }
    }

    /// 创建总是失败的 opener
    pub fn failing(message: impl Into<String>) -> Self {
        let opener = Self::new();
        opener.handle().set_failure(Some(message.into()));
        opener
    }

    /// 设置打开延迟
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// 获取用于注入事件与观察调用的句柄
    pub fn handle(&self) -> MockTransportHandle {
        MockTransportHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockSocketOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketOpener for MockSocketOpener {
    fn open(
        &self,
        dial: &DialOptions,
        events: TransportSender,
    ) -> impl std::future::Future<Output = Result<Box<dyn Socket>, TransportError>> + Send {
        let state = Arc::clone(&self.state);
        let delay = self.open_delay;
        let dial = dial.clone();
        let span = tracing::debug_span!("mock_transport_open", url = %dial.url);

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let failure = {
                let mut guard = state.lock().unwrap();
                guard.open_count += 1;
                let failure = guard.fail_with.clone();
                if failure.is_none() {
                    guard.events = Some(events);
                }
                guard.last_dial = Some(dial.clone());
                failure
            };

            if let Some(message) = failure {
                debug!(%message, "mock open failure");
                return Err(TransportError::open_failed(dial.url, message));
            }

            Ok(Box::new(MockSocket {
                state,
                closed: false,
            }) as Box<dyn Socket>)
        }
        .instrument(span)
    }
}

/// Mock 连接句柄
///
/// 模拟服务端：向当前连接推送事件，并记录客户端对 socket 的调用。
#[derive(Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransportHandle {
    /// 推送任意传输事件，没有活动连接时返回 false
    pub fn push(&self, event: TransportEvent) -> bool {
        let state = self.state.lock().unwrap();
        match state.events.as_ref() {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(TransportEvent::Message(Payload::Text(text.into())))
    }

    pub fn send_binary(&self, bytes: impl Into<Bytes>) -> bool {
        self.push(TransportEvent::Message(Payload::Binary(bytes.into())))
    }

    /// 推送一个已读取完成的 blob
    pub fn send_blob(&self, bytes: impl Into<Bytes>) -> bool {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(bytes.into()));
        self.push(TransportEvent::Message(Payload::Blob(rx)))
    }

    /// 推送一个尚未读取完成的 blob，返回完成端
    pub fn send_pending_blob(&self) -> oneshot::Sender<std::io::Result<Bytes>> {
        let (tx, rx) = oneshot::channel();
        self.push(TransportEvent::Message(Payload::Blob(rx)));
        tx
    }

    pub fn open(&self) -> bool {
        self.push(TransportEvent::Open)
    }

    /// 模拟服务端关闭连接
    pub fn close(&self, code: Option<u16>, reason: impl Into<String>) -> bool {
        let delivered = self.push(TransportEvent::Close {
            code,
            reason: reason.into(),
        });
        self.state.lock().unwrap().events = None;
        delivered
    }

    /// 模拟 socket 错误
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.push(TransportEvent::Error {
            message: message.into(),
        })
    }

    /// 丢弃事件发送端（模拟传输任务退出）
    pub fn drop_sender(&self) {
        self.state.lock().unwrap().events = None;
    }

    /// 设置后续 open 的失败消息（None = 成功）
    pub fn set_failure(&self, message: Option<String>) {
        self.state.lock().unwrap().fail_with = message;
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open_count
    }

    pub fn last_dial(&self) -> Option<DialOptions> {
        self.state.lock().unwrap().last_dial.clone()
    }

    pub fn binary_type(&self) -> Option<BinaryType> {
        self.state.lock().unwrap().binary_type
    }

    /// 客户端发起的 close 调用
    pub fn close_calls(&self) -> Vec<(Option<u16>, Option<String>)> {
        self.state.lock().unwrap().close_calls.clone()
    }
}

/// Mock socket
struct MockSocket {
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

impl Socket for MockSocket {
    fn set_binary_type(&mut self, binary_type: BinaryType) {
        self.state.lock().unwrap().binary_type = Some(binary_type);
    }

    fn close(&mut self, code: Option<u16>, reason: Option<&str>) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.state.lock().unwrap();
        state.close_calls.push((code, reason.map(str::to_owned)));
        state.events = None;
    }
}
