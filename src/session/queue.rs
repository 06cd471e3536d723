//! 有界发送队列（drop-oldest）
//!
//! 容量固定 256。满时弹出队头丢弃、再放入新消息：调用方永不阻塞、
//! 也不会因为队列满收到错误；丢弃本身是可观测事件，由会话层打日志。

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::proto::{Message, MessageKind};

/// 发送队列容量。
pub const QUEUE_CAPACITY: usize = 256;

/// 积压阈值：超过一半容量即认为有积压。
const BACKLOG_THRESHOLD: usize = QUEUE_CAPACITY / 2;

#[derive(Debug, Default)]
pub struct SendQueue {
    q: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队。若发生 drop-oldest，返回被丢弃消息的类型与当时的占用量。
    pub fn push(&self, msg: Message) -> Option<(MessageKind, usize)> {
        let dropped = {
            let mut q = self.q.lock().unwrap_or_else(|e| e.into_inner());
            let dropped = if q.len() >= QUEUE_CAPACITY {
                let occupancy = q.len();
                q.pop_front().map(|m| (m.kind, occupancy))
            } else {
                None
            };
            q.push_back(msg);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    pub fn pop(&self) -> Option<Message> {
        self.q.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    pub fn len(&self) -> usize {
        self.q.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 占用超过一半容量即有积压（纯观测信号，不做流控门）。
    pub fn has_backlog(&self) -> bool {
        self.len() > BACKLOG_THRESHOLD
    }

    /// 等待有新消息入队（与 flush worker 的 500ms 轮询配合使用）。
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}
