//! 拥塞仿真模块
//!
//! 在真实消息传输之外并行制造一条合成的分段/ACK/超时事件流，驱动
//! 拥塞状态机；真实字节流原样转发，不受仿真影响。
//! 分段跟踪状态由单个 actor 任务独占，命令与定时器 tick 走同一个串行队列。

mod config;
mod core;
mod harness;
mod segment;

pub use config::{
    SimConfig, ACK_INTERVAL, DEFAULT_DELAY, DEFAULT_LOSS_RATE, MAX_SEND_DELAY, MSS,
    SEGMENT_RETENTION, STATS_PUSH_INTERVAL, TIMEOUT_SCAN_INTERVAL,
};
pub use self::core::SimCore;
pub use harness::{CongestionSim, MessageSink};
pub use segment::SimSegment;
