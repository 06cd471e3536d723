use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use crate::proto::{self, Message, MessageKind};
use crate::session::{Session, SessionEvents};

struct TestEvents {
    received: Mutex<Vec<(u64, Message)>>,
    disconnected: AtomicBool,
}

impl TestEvents {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            received: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        })
    }
}

impl SessionEvents for TestEvents {
    fn on_message(&self, client_id: u64, msg: Message) {
        self.received.lock().unwrap().push((client_id, msg));
    }

    fn on_disconnect(&self, _client_id: u64) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

fn chat(text: &str) -> Message {
    Message::with_field(MessageKind::Chat, "text", json!(text))
}

#[tokio::test]
async fn enqueued_messages_reach_the_wire() {
    let (mut peer, local) = tokio::io::duplex(4096);
    let session = Session::spawn(7, local, TestEvents::new());

    session.enqueue(chat("one"));
    session.enqueue(chat("two"));

    let first = timeout(Duration::from_secs(5), proto::read_message(&mut peer))
        .await
        .expect("first frame in time")
        .expect("decode");
    let second = timeout(Duration::from_secs(5), proto::read_message(&mut peer))
        .await
        .expect("second frame in time")
        .expect("decode");

    assert_eq!(first, chat("one"));
    assert_eq!(second, chat("two"));

    session.close();
}

#[tokio::test]
async fn incoming_frames_are_dispatched_with_the_client_id() {
    let (mut peer, local) = tokio::io::duplex(4096);
    let events = TestEvents::new();
    let session = Session::spawn(42, local, events.clone());

    proto::send_message(&mut peer, &chat("ping"))
        .await
        .expect("peer write");

    wait_until(|| !events.received.lock().unwrap().is_empty()).await;
    let received = events.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, 42);
    assert_eq!(received[0].1, chat("ping"));
    drop(received);

    session.close();
}

#[tokio::test]
async fn peer_hangup_tears_the_session_down() {
    let (peer, local) = tokio::io::duplex(4096);
    let events = TestEvents::new();
    let session = Session::spawn(1, local, events.clone());

    drop(peer); // EOF on the read side

    wait_until(|| events.disconnected.load(Ordering::SeqCst)).await;
    wait_until(|| session.is_closed()).await;
}

#[tokio::test]
async fn close_is_idempotent() {
    let (_peer, local) = tokio::io::duplex(64);
    let session = Session::spawn(1, local, TestEvents::new());

    assert!(!session.is_closed());
    session.close();
    session.close();
    assert!(session.is_closed());
}

#[tokio::test]
async fn display_name_defaults_to_the_client_id() {
    let (_peer, local) = tokio::io::duplex(64);
    let session = Session::spawn(9, local, TestEvents::new());

    assert_eq!(session.display_name(), "Client-9");
    session.set_display_name("alice".into());
    assert_eq!(session.display_name(), "alice");

    session.close();
}
