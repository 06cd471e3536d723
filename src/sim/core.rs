//! 仿真核心逻辑（无 I/O、无定时器）
//!
//! 拥有拥塞状态机与分段跟踪表；时间与随机源都由调用方注入，
//! 方便确定性测试。actor（`harness`）只是在定时器 tick 时调用这里。

use std::collections::HashMap;
use std::time::Instant;

use rand::Rng;

use crate::cc::{Algorithm, CongestionController, CongestionStats, StatsObserver};
use crate::sim::{SimConfig, SimSegment, MSS, SEGMENT_RETENTION};

pub struct SimCore {
    controller: CongestionController,
    /// seq -> 段；只被本 actor 访问
    segments: HashMap<u64, SimSegment>,
    /// seq -> 期望的 ACK 号（固定 seq+1：一段一 ACK，不做累计确认）
    ack_for: HashMap<u64, u64>,
    next_seq: u64,
    expected_next_ack: u64,
    config: SimConfig,
}

impl SimCore {
    pub fn new(algorithm: Algorithm, config: SimConfig) -> Self {
        Self {
            controller: CongestionController::new(algorithm),
            segments: HashMap::new(),
            ack_for: HashMap::new(),
            next_seq: 1,
            expected_next_ack: 1,
            config,
        }
    }

    pub fn config(&self) -> SimConfig {
        self.config
    }

    pub fn set_loss_rate(&mut self, rate: f64) {
        self.config.set_loss_rate(rate);
    }

    pub fn set_delay(&mut self, delay: std::time::Duration) {
        self.config.set_delay(delay);
    }

    pub fn set_observer(&mut self, observer: Option<StatsObserver>) {
        self.controller.set_observer(observer);
    }

    pub fn stats(&self) -> CongestionStats {
        self.controller.stats()
    }

    pub fn controller(&self) -> &CongestionController {
        &self.controller
    }

    /// 登记一次出站发送：按 `ceil(len / MSS)` 切段，逐段通知状态机。
    /// 返回本次产生的序列号（发送 worker 用来回报丢包）。
    pub fn register_send(&mut self, byte_len: usize, now: Instant) -> Vec<u64> {
        let nsegs = byte_len.div_ceil(MSS);
        let mut seqs = Vec::with_capacity(nsegs);
        for _ in 0..nsegs {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.segments.insert(seq, SimSegment::new(seq, now));
            self.ack_for.insert(seq, seq + 1);
            self.controller.on_segment_sent();
            seqs.push(seq);
        }
        seqs
    }

    /// 发送后的丢包抽签判“丢”：记重传并立刻按超时处理。
    pub fn mark_lost(&mut self, seqs: &[u64]) {
        for seq in seqs {
            if let Some(seg) = self.segments.get_mut(seq) {
                seg.retransmits += 1;
            }
        }
        self.controller.on_timeout();
    }

    /// 周期任务 A：给已过仿真时延、且这次没被抽中丢弃的段合成 ACK。
    /// 已重传过的段不再抽签（视为必达）。
    pub fn simulate_acks(&mut self, now: Instant, rng: &mut impl Rng) {
        let delay = self.config.delay();
        let loss = self.config.loss_rate();

        let mut to_ack = Vec::new();
        for seg in self.segments.values() {
            if !seg.acked && seg.age(now) > delay {
                if rng.r#gen::<f64>() >= loss || seg.retransmits > 0 {
                    to_ack.push(seg.seq);
                }
            }
        }

        for seq in to_ack {
            let Some(seg) = self.segments.get_mut(&seq) else {
                continue;
            };
            seg.acked = true;
            let sample = seg.age(now);
            let ack = self.ack_for.get(&seq).copied().unwrap_or(seq + 1);
            // 一段一 ACK：低于期望号就是重复 ACK
            let duplicate = ack < self.expected_next_ack;
            if !duplicate {
                self.expected_next_ack = ack + 1;
            }
            self.controller.update_rtt(sample);
            self.controller.on_ack_received(ack, duplicate);
        }

        // 已确认的段只为可视化再保留一小段时间
        self.segments
            .retain(|_, s| !(s.acked && s.age(now) > SEGMENT_RETENTION));
        let segments = &self.segments;
        self.ack_for.retain(|seq, _| segments.contains_key(seq));
    }

    /// 周期任务 B：未确认且超过 `2 * estimatedRTT` 的段按超时处理，
    /// 记一次重传并重置其创建时间（仿真重传）。
    pub fn check_timeouts(&mut self, now: Instant) {
        let threshold = self.controller.timeout_threshold();

        let mut timed_out = Vec::new();
        for seg in self.segments.values() {
            if !seg.acked && seg.age(now) > threshold {
                timed_out.push(seg.seq);
            }
        }

        for seq in timed_out {
            if let Some(seg) = self.segments.get_mut(&seq) {
                self.controller.on_timeout();
                seg.retransmits += 1;
                seg.created_at = now;
            }
        }
    }

    pub fn segment(&self, seq: u64) -> Option<&SimSegment> {
        self.segments.get(&seq)
    }

    pub fn tracked_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn expected_next_ack(&self) -> u64 {
        self.expected_next_ack
    }
}
