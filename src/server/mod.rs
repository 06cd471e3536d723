//! 服务端模块
//!
//! accept 循环 + 消息分发：聊天/白板/文件消息的转发与历史维护。

mod hub;

pub use hub::Hub;
