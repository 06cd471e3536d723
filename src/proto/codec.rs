//! 长度前缀编解码
//!
//! 线格式：`[4 字节大端长度 L][L 字节 UTF-8 JSON]`。
//! 读侧带 30s 空闲超时；写侧对瞬时失败重试一次（50ms 后），再失败即致命。

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::proto::Message;

/// 单帧长度上限（字节）。
pub const MAX_FRAME_BYTES: usize = 10_000_000;

/// 读空闲超时：超过即判定连接失活。
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// 写失败后的重试间隔（只重试一次）。
pub const SEND_RETRY_DELAY: Duration = Duration::from_millis(50);

/// 编码为完整帧（含 4 字节长度前缀）。
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg).map_err(|e| Error::Protocol(e.to_string()))?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(Error::Protocol(format!(
            "frame too large: {} bytes",
            body.len()
        )));
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as i32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

async fn read_frame<R>(r: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let len = r.read_i32().await?;
    if len <= 0 || len as usize > MAX_FRAME_BYTES {
        return Err(Error::Protocol(format!("invalid message length: {len}")));
    }
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body).await?;
    serde_json::from_slice(&body).map_err(|e| Error::Protocol(e.to_string()))
}

/// 读取一条消息；整帧读取受 [`READ_IDLE_TIMEOUT`] 约束。
pub async fn read_message<R>(r: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    match timeout(READ_IDLE_TIMEOUT, read_frame(r)).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout),
    }
}

/// 发送一条消息。
///
/// 整帧一次性写出；调用方保证同一连接同一时刻只有一个写者
/// （session 的写半边由唯一的 flush worker 独占），否则长度前缀会被交错破坏。
pub async fn send_message<W>(w: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(msg)?;
    match write_frame(w, &frame).await {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!(error = %first, "发送失败，50ms 后重试一次");
            tokio::time::sleep(SEND_RETRY_DELAY).await;
            write_frame(w, &frame).await.map_err(Error::Io)
        }
    }
}

async fn write_frame<W>(w: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_all(frame).await?;
    w.flush().await
}
