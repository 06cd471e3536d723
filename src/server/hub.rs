//! 服务端 hub
//!
//! 持有连接注册表与聊天/白板历史，按消息类型分发：
//! HELLO 握手、CHAT/DRAW_EVENT 存历史并广播、CLEAR_BOARD 清空、
//! FILE_* 按 targetIds 定向路由（缺省广播）。
//! 会话级错误只拆除该连接，不影响其他连接。

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::proto::{Message, MessageKind};
use crate::session::{Registry, Session, SessionEvents};
use crate::Result;

pub struct Hub {
    registry: Registry,
    // 历史：新客户端入场时补发，让它看到已有的聊天与白板状态。
    chat_history: Mutex<Vec<Value>>,
    board_events: Mutex<Vec<Value>>,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Registry::new(),
            chat_history: Mutex::new(Vec::new()),
            board_events: Mutex::new(Vec::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// accept 循环：为每个连接建会话、广播上线通知。
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            // 关闭 Nagle，降低小消息延迟
            stream.set_nodelay(true).ok();

            let id = self.registry.next_id();
            let session = Session::spawn(id, stream, self.clone());
            self.registry.insert(session);
            tracing::info!(client_id = id, peer = %addr, "客户端接入");

            self.broadcast_client_list();
            self.send_server_info(&format!("Client {id} connected."));
        }
    }

    pub fn shutdown(&self) {
        self.registry.close_all();
    }

    fn handle_incoming(&self, client_id: u64, msg: Message) {
        match msg.kind {
            MessageKind::Hello => self.handle_hello(client_id, &msg),
            MessageKind::Chat => {
                self.chat_history
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(Value::Object(msg.payload.clone()));
                self.broadcast(&msg);
            }
            MessageKind::DrawEvent => {
                self.board_events
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(Value::Object(msg.payload.clone()));
                self.broadcast(&msg);
            }
            MessageKind::ClearBoard => {
                self.board_events
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clear();
                self.broadcast(&msg);
            }
            MessageKind::BoardSnapshot => self.broadcast(&msg),
            MessageKind::FileMeta | MessageKind::FileChunk | MessageKind::FileComplete => {
                self.route_file_message(&msg);
            }
            other => {
                // PACKET/ACK/CONGESTION_STATS 等保留类型：忽略
                tracing::trace!(client_id, kind = ?other, "忽略不处理的消息类型");
            }
        }
    }

    fn handle_hello(&self, client_id: u64, msg: &Message) {
        let name = msg
            .payload
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Client-{client_id}"));

        let session = self.registry.get(client_id);
        if let Some(session) = &session {
            session.set_display_name(name);
            // 告知该客户端它被分配的 id
            session.enqueue(Message::with_field(
                MessageKind::Welcome,
                "clientId",
                json!(client_id),
            ));
        }
        self.send_history_to(client_id);
        self.broadcast_client_list();
    }

    /// 文件消息按负载里的 targetIds 定向投递；没有就广播。
    fn route_file_message(&self, msg: &Message) {
        match msg.payload.get("targetIds").and_then(Value::as_array) {
            Some(targets) => {
                for t in targets {
                    if let Some(target_id) = t.as_u64() {
                        if let Some(s) = self.registry.get(target_id) {
                            s.enqueue(msg.clone());
                        }
                    }
                }
            }
            None => self.broadcast(msg),
        }
    }

    fn broadcast(&self, msg: &Message) {
        for s in self.registry.snapshot() {
            s.enqueue(msg.clone());
        }
    }

    fn broadcast_client_list(&self) {
        let clients: Vec<Value> = self
            .registry
            .snapshot()
            .iter()
            .map(|s| json!({ "id": s.id(), "name": s.display_name() }))
            .collect();
        let msg = Message::with_field(MessageKind::ClientList, "clients", Value::Array(clients));
        self.broadcast(&msg);
    }

    fn send_server_info(&self, info: &str) {
        tracing::info!(info, "服务器通知");
        let msg = Message::with_field(MessageKind::ServerInfo, "info", json!(info));
        self.broadcast(&msg);
    }

    fn send_history_to(&self, client_id: u64) {
        let Some(session) = self.registry.get(client_id) else {
            return;
        };

        let chat_items = self
            .chat_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        session.enqueue(Message::with_field(
            MessageKind::ChatHistory,
            "items",
            Value::Array(chat_items),
        ));

        let board_items = self
            .board_events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        session.enqueue(Message::with_field(
            MessageKind::BoardHistory,
            "items",
            Value::Array(board_items),
        ));
    }
}

impl SessionEvents for Hub {
    fn on_message(&self, client_id: u64, msg: Message) {
        self.handle_incoming(client_id, msg);
    }

    fn on_disconnect(&self, client_id: u64) {
        // 可能被读写两侧各触发一次；remove 幂等
        if self.registry.remove(client_id).is_some() {
            tracing::info!(client_id, "客户端断开");
            self.broadcast_client_list();
            self.send_server_info(&format!("Client {client_id} disconnected."));
        }
    }
}
