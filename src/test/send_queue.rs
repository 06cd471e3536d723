use serde_json::json;

use crate::proto::{Message, MessageKind};
use crate::session::{SendQueue, QUEUE_CAPACITY};

fn numbered(n: usize) -> Message {
    Message::with_field(MessageKind::Chat, "n", json!(n))
}

fn number_of(msg: &Message) -> usize {
    msg.payload["n"].as_u64().unwrap() as usize
}

#[test]
fn drop_oldest_keeps_the_newest_256_in_order() {
    let q = SendQueue::new();

    for n in 0..300 {
        let dropped = q.push(numbered(n));
        if n < QUEUE_CAPACITY {
            assert!(dropped.is_none(), "no drop expected at n={n}");
        } else {
            let (kind, occupancy) = dropped.expect("queue full, oldest must be dropped");
            assert_eq!(kind, MessageKind::Chat);
            assert_eq!(occupancy, QUEUE_CAPACITY);
        }
    }

    assert_eq!(q.len(), QUEUE_CAPACITY);

    // The 44 oldest messages were dropped; the rest keep their relative order.
    for expected in 44..300 {
        let msg = q.pop().expect("queue should not be empty yet");
        assert_eq!(number_of(&msg), expected);
    }
    assert!(q.pop().is_none());
}

#[test]
fn backlog_signal_trips_above_half_capacity() {
    let q = SendQueue::new();

    for n in 0..128 {
        q.push(numbered(n));
    }
    assert!(!q.has_backlog());

    q.push(numbered(128));
    assert!(q.has_backlog());

    q.pop();
    assert!(!q.has_backlog());
}

#[test]
fn pop_on_empty_returns_none() {
    let q = SendQueue::new();
    assert!(q.is_empty());
    assert!(q.pop().is_none());
}
