//! 会话传输模块
//!
//! 每个连接一个会话：独立的读循环 + 有界发送队列 + 专职 flush worker。
//! 发送端永不阻塞生产者：队列满时按 drop-oldest 丢弃并记录诊断事件。

mod queue;
mod registry;
#[allow(clippy::module_inception)]
mod session;

pub use queue::{SendQueue, QUEUE_CAPACITY};
pub use registry::Registry;
pub use session::{Session, SessionEvents, WRITE_POLL_INTERVAL};
