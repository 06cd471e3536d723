//! 仿真段
//!
//! 只存在于仿真线束内部，绝不上线。

use std::time::{Duration, Instant};

/// 一条出站消息切出的仿真段。
#[derive(Debug, Clone)]
pub struct SimSegment {
    pub seq: u64,
    /// 仿真重传时会被重置
    pub created_at: Instant,
    pub acked: bool,
    pub retransmits: u32,
}

impl SimSegment {
    pub fn new(seq: u64, now: Instant) -> Self {
        Self {
            seq,
            created_at: now,
            acked: false,
            retransmits: 0,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}
