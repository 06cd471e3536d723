use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::json;
use tokio::io::AsyncWrite;

use crate::error::Error;
use crate::proto::{self, Message, MessageKind};

#[tokio::test]
async fn round_trip_every_message_kind() {
    for kind in MessageKind::ALL {
        let msg = Message::with_field(kind, "k", json!(1));
        let frame = proto::encode(&msg).expect("encode");

        let mut slice: &[u8] = &frame;
        let decoded = proto::read_message(&mut slice).await.expect("decode");
        assert_eq!(decoded, msg, "round trip failed for {kind:?}");
    }
}

#[tokio::test]
async fn frame_starts_with_big_endian_body_length() {
    let msg = Message::empty(MessageKind::Chat);
    let frame = proto::encode(&msg).expect("encode");

    let len = i32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    assert_eq!(len as usize, frame.len() - 4);

    let body: serde_json::Value = serde_json::from_slice(&frame[4..]).expect("body is JSON");
    assert_eq!(body["type"], "CHAT");
    assert!(body["payload"].is_object());
}

#[tokio::test]
async fn rejects_non_positive_length() {
    for len in [0i32, -5] {
        let frame = len.to_be_bytes();
        let mut slice: &[u8] = &frame;
        let err = proto::read_message(&mut slice).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "len={len}: {err:?}");
    }
}

#[tokio::test]
async fn rejects_oversize_length() {
    let frame = (proto::MAX_FRAME_BYTES as i32 + 1).to_be_bytes();
    let mut slice: &[u8] = &frame[..];
    let err = proto::read_message(&mut slice).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn rejects_unknown_kind() {
    let body = br#"{"type":"BOGUS","payload":{}}"#;
    let mut frame = (body.len() as i32).to_be_bytes().to_vec();
    frame.extend_from_slice(body);

    let mut slice: &[u8] = &frame;
    let err = proto::read_message(&mut slice).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn rejects_missing_payload() {
    let body = br#"{"type":"CHAT"}"#;
    let mut frame = (body.len() as i32).to_be_bytes().to_vec();
    frame.extend_from_slice(body);

    let mut slice: &[u8] = &frame;
    let err = proto::read_message(&mut slice).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn truncated_stream_is_an_io_error() {
    // Length prefix promises 100 bytes, stream ends early.
    let mut frame = 100i32.to_be_bytes().to_vec();
    frame.extend_from_slice(b"short");

    let mut slice: &[u8] = &frame;
    let err = proto::read_message(&mut slice).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test(start_paused = true)]
async fn idle_read_times_out() {
    let (mut quiet, _keep_open) = tokio::io::duplex(64);
    let err = proto::read_message(&mut quiet).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

/// Writer that fails the first `fails` write calls, then records bytes.
struct FlakyWriter {
    fails: usize,
    buf: Vec<u8>,
}

impl AsyncWrite for FlakyWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fails > 0 {
            self.fails -= 1;
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "flaky")));
        }
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test(start_paused = true)]
async fn send_retries_once_after_transient_failure() {
    let mut writer = FlakyWriter {
        fails: 1,
        buf: Vec::new(),
    };
    let msg = Message::with_field(MessageKind::Chat, "text", json!("hi"));

    proto::send_message(&mut writer, &msg)
        .await
        .expect("retry should succeed");

    let mut slice: &[u8] = &writer.buf;
    let decoded = proto::read_message(&mut slice).await.expect("decode");
    assert_eq!(decoded, msg);
}

#[tokio::test(start_paused = true)]
async fn second_send_failure_is_fatal() {
    let mut writer = FlakyWriter {
        fails: 2,
        buf: Vec::new(),
    };
    let msg = Message::empty(MessageKind::Chat);

    let err = proto::send_message(&mut writer, &msg).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(writer.buf.is_empty());
}
