//! Tahoe / Reno 拥塞控制状态机
//!
//! 跟踪 cwnd、ssthresh、阶段与 RTT 估计；入口只有四个：
//! `on_segment_sent` / `on_ack_received` / `on_timeout` / `update_rtt`。
//! 每条变更路径结束时同步回调观察者（观察者不得反过来改状态机）。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CongestionStats;

/// 拥塞算法变体。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Tahoe,
    Reno,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tahoe" => Ok(Algorithm::Tahoe),
            "reno" => Ok(Algorithm::Reno),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

/// 拥塞阶段。`FastRecovery` 仅 Reno 会进入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// 状态机初始参数。
#[derive(Debug, Clone)]
pub struct CongestionConfig {
    pub init_cwnd: u32,
    pub init_ssthresh: u32,
    pub init_rtt: Duration,
    pub init_phase: Phase,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            init_cwnd: 1,
            init_ssthresh: 64,
            init_rtt: Duration::from_millis(100),
            init_phase: Phase::SlowStart,
        }
    }
}

/// 统计快照观察者。
pub type StatsObserver = Arc<dyn Fn(&CongestionStats) + Send + Sync>;

const MAX_CWND: u32 = 1000;
const MIN_CWND: u32 = 1;
const MIN_SSTHRESH: u32 = 2;

/// 每个连接一侧实例化一个，绝不跨连接共享。
pub struct CongestionController {
    algorithm: Algorithm,
    cwnd: u32,
    ssthresh: u32,
    phase: Phase,
    estimated_rtt_ms: u64,
    dup_ack_run: u32,
    next_seq: u64,
    expected_ack: u64,
    /// 拥塞避免阶段的小数累积（每个 ACK 增加 1/cwnd，攒满 1 才加窗）
    avoid_frac: f64,
    round: u64,
    acks_this_round: u32,

    total_sent: u64,
    total_acked: u64,
    total_timeouts: u64,
    total_dup_acks: u64,

    observer: Option<StatsObserver>,
}

impl CongestionController {
    pub fn new(algorithm: Algorithm) -> Self {
        Self::with_config(algorithm, CongestionConfig::default())
    }

    pub fn with_config(algorithm: Algorithm, cfg: CongestionConfig) -> Self {
        Self {
            algorithm,
            cwnd: cfg.init_cwnd.clamp(MIN_CWND, MAX_CWND),
            ssthresh: cfg.init_ssthresh.max(MIN_SSTHRESH),
            phase: cfg.init_phase,
            estimated_rtt_ms: cfg.init_rtt.as_millis() as u64,
            dup_ack_run: 0,
            next_seq: 1,
            expected_ack: 1,
            avoid_frac: 0.0,
            round: 0,
            acks_this_round: 0,
            total_sent: 0,
            total_acked: 0,
            total_timeouts: 0,
            total_dup_acks: 0,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Option<StatsObserver>) {
        self.observer = observer;
    }

    /// 发出一个段：只推进计数，不改阶段。
    pub fn on_segment_sent(&mut self) {
        self.total_sent += 1;
        self.next_seq += 1;
        self.notify();
    }

    /// 收到一个（仿真的）ACK。
    ///
    /// 重复判定：`dup_hint` 为真，或 `ack < expected_ack`。
    /// `dup_hint` 在当前纯仿真配置下恒为 false，保留给将来线上协议。
    pub fn on_ack_received(&mut self, ack: u64, dup_hint: bool) {
        self.total_acked += 1;

        let duplicate = dup_hint || ack < self.expected_ack;
        if duplicate {
            self.dup_ack_run += 1;
            self.total_dup_acks += 1;

            if self.dup_ack_run == 3 && self.phase != Phase::FastRecovery {
                // 第 3 个重复 ACK：两种算法都反应，方式不同
                self.ssthresh = (self.cwnd / 2).max(MIN_SSTHRESH);
                match self.algorithm {
                    Algorithm::Reno => {
                        // 快速重传：cwnd 砍半并进入快速恢复
                        self.cwnd = self.ssthresh;
                        self.phase = Phase::FastRecovery;
                        self.avoid_frac = 0.0;
                        self.acks_this_round = 0;
                    }
                    Algorithm::Tahoe => {
                        // Tahoe 没有快速恢复：当超时处理，回到慢启动
                        self.cwnd = MIN_CWND;
                        self.phase = Phase::SlowStart;
                        self.dup_ack_run = 0;
                        self.avoid_frac = 0.0;
                        self.acks_this_round = 0;
                    }
                }
            } else if self.algorithm == Algorithm::Reno && self.phase == Phase::FastRecovery {
                // 快速恢复中的每个额外重复 ACK 使窗口膨胀一个段
                self.cwnd = (self.cwnd + 1).min(MAX_CWND);
            }
        } else {
            // 新 ACK：确认了新数据
            self.dup_ack_run = 0;
            self.expected_ack = ack + 1;

            // 一轮 = 收满一个窗口的新 ACK，近似一个 RTT
            self.acks_this_round += 1;
            if self.acks_this_round >= self.cwnd {
                self.round += 1;
                self.acks_this_round = 0;
            }

            match self.phase {
                Phase::SlowStart => {
                    self.cwnd = (self.cwnd + 1).min(MAX_CWND);
                    if self.cwnd >= self.ssthresh {
                        self.phase = Phase::CongestionAvoidance;
                        self.avoid_frac = 0.0;
                    }
                }
                Phase::CongestionAvoidance => {
                    self.avoid_frac += 1.0 / self.cwnd as f64;
                    if self.avoid_frac >= 1.0 {
                        self.cwnd = (self.cwnd + 1).min(MAX_CWND);
                        self.avoid_frac -= 1.0;
                    }
                }
                Phase::FastRecovery => {
                    // 新 ACK 退出快速恢复
                    self.cwnd = self.ssthresh;
                    self.phase = Phase::CongestionAvoidance;
                    self.avoid_frac = 0.0;
                }
            }
        }

        self.notify();
    }

    /// 超时：两种算法的处理完全一致。
    pub fn on_timeout(&mut self) {
        self.total_timeouts += 1;
        self.ssthresh = (self.cwnd / 2).max(MIN_SSTHRESH);
        self.cwnd = MIN_CWND;
        self.phase = Phase::SlowStart;
        self.dup_ack_run = 0;
        self.avoid_frac = 0.0;
        self.acks_this_round = 0;
        self.notify();
    }

    /// 指数加权滑动平均更新 RTT 估计。
    pub fn update_rtt(&mut self, sample: Duration) {
        let sample_ms = sample.as_millis() as u64;
        self.estimated_rtt_ms =
            (0.875 * self.estimated_rtt_ms as f64 + 0.125 * sample_ms as f64) as u64;
        self.notify();
    }

    /// 超时判定阈值：2 倍 RTT 估计。
    pub fn timeout_threshold(&self) -> Duration {
        Duration::from_millis(self.estimated_rtt_ms.saturating_mul(2))
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn estimated_rtt(&self) -> Duration {
        Duration::from_millis(self.estimated_rtt_ms)
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn stats(&self) -> CongestionStats {
        CongestionStats {
            algorithm: self.algorithm,
            cwnd: self.cwnd,
            ssthresh: self.ssthresh,
            phase: self.phase,
            rtt_ms: self.estimated_rtt_ms,
            sent: self.total_sent,
            acked: self.total_acked,
            timeouts: self.total_timeouts,
            dup_acks_total: self.total_dup_acks,
            dup_ack_run: self.dup_ack_run,
            round: self.round,
        }
    }

    fn notify(&self) {
        if let Some(cb) = &self.observer {
            cb(&self.stats());
        }
    }
}
