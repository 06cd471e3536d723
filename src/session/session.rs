//! 单连接会话
//!
//! 一个会话拥有两个任务：
//! - 读循环：持续解码消息并派发给上层；任何解码错误都拆除会话。
//! - flush worker：以最多 500ms 的有界等待从队列取消息写线；
//!   发送失败（重试一次之后）即致命，拆除会话。
//!
//! 写半边由 flush worker 独占，保证同一连接同一时刻只有一个发送在途。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

use crate::proto::{self, Message};
use crate::session::SendQueue;

/// flush worker 空轮询的上限间隔，保证关闭能及时生效。
pub const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 会话事件回调：由上层（服务端 hub 或客户端）实现。
///
/// 回调在会话自己的任务里同步执行，不要在里面做长阻塞。
pub trait SessionEvents: Send + Sync + 'static {
    fn on_message(&self, client_id: u64, msg: Message);
    fn on_disconnect(&self, client_id: u64);
}

pub struct Session {
    id: u64,
    display_name: Mutex<String>,
    queue: SendQueue,
    closed_tx: watch::Sender<bool>,
    closed: AtomicBool,
}

impl Session {
    /// 在给定的字节流上启动一个会话（读任务 + 写任务）。
    pub fn spawn<S>(id: u64, stream: S, events: Arc<dyn SessionEvents>) -> Arc<Session>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (closed_tx, closed_rx) = watch::channel(false);
        let session = Arc::new(Session {
            id,
            display_name: Mutex::new(format!("Client-{id}")),
            queue: SendQueue::new(),
            closed_tx,
            closed: AtomicBool::new(false),
        });

        let (reader, writer) = tokio::io::split(stream);
        tokio::spawn(read_loop(
            session.clone(),
            reader,
            events.clone(),
            closed_rx.clone(),
        ));
        tokio::spawn(write_loop(session.clone(), writer, events, closed_rx));
        session
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn display_name(&self) -> String {
        self.display_name
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_display_name(&self, name: String) {
        *self.display_name.lock().unwrap_or_else(|e| e.into_inner()) = name;
    }

    /// 非阻塞入队；队列满时 drop-oldest 并记录诊断事件。
    pub fn enqueue(&self, msg: Message) {
        if let Some((dropped, occupancy)) = self.queue.push(msg) {
            tracing::warn!(
                client_id = self.id,
                occupancy,
                dropped_kind = ?dropped,
                "发送队列已满，丢弃最旧消息"
            );
        }
    }

    /// 积压探测（> 128/256）。纯观测信号。
    pub fn has_backlog(&self) -> bool {
        let backlog = self.queue.has_backlog();
        if backlog {
            tracing::debug!(
                client_id = self.id,
                queued = self.queue.len(),
                "检测到发送积压，延迟在上升"
            );
        }
        backlog
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// 幂等关闭：通知两个任务退出。
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.closed_tx.send(true);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

async fn read_loop<R>(
    session: Arc<Session>,
    mut reader: R,
    events: Arc<dyn SessionEvents>,
    mut closed: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin + Send,
{
    loop {
        if *closed.borrow() {
            break;
        }
        tokio::select! {
            res = proto::read_message(&mut reader) => match res {
                Ok(msg) => events.on_message(session.id, msg),
                Err(e) => {
                    tracing::debug!(client_id = session.id, error = %e, "读循环结束");
                    break;
                }
            },
            _ = closed.changed() => break,
        }
    }
    session.close();
    events.on_disconnect(session.id);
}

async fn write_loop<W>(
    session: Arc<Session>,
    mut writer: W,
    events: Arc<dyn SessionEvents>,
    mut closed: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        if *closed.borrow() {
            break;
        }
        match session.queue.pop() {
            Some(msg) => {
                if let Err(e) = proto::send_message(&mut writer, &msg).await {
                    tracing::warn!(client_id = session.id, error = %e, "发送失败，拆除会话");
                    session.close();
                    events.on_disconnect(session.id);
                    break;
                }
            }
            None => {
                tokio::select! {
                    _ = session.queue.wait() => {}
                    _ = tokio::time::sleep(WRITE_POLL_INTERVAL) => {}
                    _ = closed.changed() => break,
                }
            }
        }
    }
}
