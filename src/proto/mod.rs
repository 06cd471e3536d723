//! 消息协议模块
//!
//! 包含类型化消息定义与长度前缀编解码（`[4 字节大端长度][UTF-8 JSON]`）。

mod codec;
mod message;

pub use codec::{
    encode, read_message, send_message, MAX_FRAME_BYTES, READ_IDLE_TIMEOUT, SEND_RETRY_DELAY,
};
pub use message::{Message, MessageKind};
