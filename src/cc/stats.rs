//! 拥塞统计快照
//!
//! 每次状态变化都会产生一份快照推给观察者，便于外部（图表）重放全部转移。

use serde::{Deserialize, Serialize};

use super::{Algorithm, Phase};

/// 一份只读的拥塞状态快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionStats {
    pub algorithm: Algorithm,
    /// 拥塞窗口（单位：段）
    pub cwnd: u32,
    /// 慢启动阈值
    pub ssthresh: u32,
    pub phase: Phase,
    /// RTT 估计（毫秒）
    pub rtt_ms: u64,
    pub sent: u64,
    pub acked: u64,
    pub timeouts: u64,
    /// 累计重复 ACK 数
    pub dup_acks_total: u64,
    /// 当前连续重复 ACK 计数
    pub dup_ack_run: u32,
    /// 传输轮次（约等于经过的 RTT 个数）
    pub round: u64,
}
