//! 错误类型
//!
//! 编解码、会话传输与仿真线束共用的错误分类。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// 帧格式错误、长度前缀越界或未知消息类型。对连接致命，不重试。
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 连接读侧空闲超过上限。
    #[error("read idle timeout")]
    Timeout,

    /// 套接字故障。发送路径重试一次，其余场合直接致命。
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 对已关停的传输/线束发起操作。
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
