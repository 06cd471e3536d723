//! 类型化协议消息
//!
//! 一条消息 = 固定枚举的消息类型 + 任意 JSON object 负载。
//! 负载的内部结构由上层各自约定，核心层只要求它存在且为 object。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 消息类型（封闭枚举；线上名称为 SCREAMING_SNAKE_CASE）。
///
/// `Packet` / `Ack` / `CongestionStats` 为将来线上拥塞协议预留，
/// 当前设计中拥塞引擎只在客户端本地仿真，不会把它们放到线上。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// 握手：携带客户端显示名
    Hello,
    /// 服务端 -> 客户端：分配的 client id
    Welcome,
    /// 服务端 -> 全体：当前在线客户端列表
    ClientList,
    /// 聊天消息
    Chat,
    /// 服务端 -> 客户端：入场时的聊天历史
    ChatHistory,
    /// 白板笔画事件
    DrawEvent,
    /// 服务端 -> 客户端：入场时的白板历史
    BoardHistory,
    /// 清空白板
    ClearBoard,
    /// 共享整板快照
    BoardSnapshot,
    /// 文件传输：元信息
    FileMeta,
    /// 文件传输：数据块
    FileChunk,
    /// 文件传输：完成
    FileComplete,
    /// 服务端通知
    ServerInfo,
    /// 错误消息
    Error,
    Packet,
    Ack,
    CongestionStats,
}

impl MessageKind {
    /// 全部消息类型（测试遍历用）。
    pub const ALL: [MessageKind; 17] = [
        MessageKind::Hello,
        MessageKind::Welcome,
        MessageKind::ClientList,
        MessageKind::Chat,
        MessageKind::ChatHistory,
        MessageKind::DrawEvent,
        MessageKind::BoardHistory,
        MessageKind::ClearBoard,
        MessageKind::BoardSnapshot,
        MessageKind::FileMeta,
        MessageKind::FileChunk,
        MessageKind::FileComplete,
        MessageKind::ServerInfo,
        MessageKind::Error,
        MessageKind::Packet,
        MessageKind::Ack,
        MessageKind::CongestionStats,
    ];
}

/// 协议消息：`{"type": <kind>, "payload": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub payload: Map<String, Value>,
}

impl Message {
    pub fn new(kind: MessageKind, payload: Map<String, Value>) -> Self {
        Self { kind, payload }
    }

    /// 空负载消息。
    pub fn empty(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: Map::new(),
        }
    }

    /// 便捷构造：单字段负载。
    pub fn with_field(kind: MessageKind, key: &str, value: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(key.to_string(), value);
        Self { kind, payload }
    }
}
