//! 仿真参数
//!
//! 丢包率与网络时延运行期可改，越界取值一律钳制而不是报错。

use std::time::Duration;

/// 最大段尺寸（字节）：一条消息按 `ceil(len / MSS)` 切成仿真段。
pub const MSS: usize = 1460;

/// 缺省仿真丢包率（2%）。
pub const DEFAULT_LOSS_RATE: f64 = 0.02;

/// 缺省仿真网络时延。
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// 真实发送前施加的仿真时延上限（保证交互响应）。
pub const MAX_SEND_DELAY: Duration = Duration::from_millis(100);

/// ACK 合成周期。
pub const ACK_INTERVAL: Duration = Duration::from_millis(200);

/// 超时扫描周期。
pub const TIMEOUT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// 统计快照推送周期（无论有无变化都推，方便画连续时间线）。
pub const STATS_PUSH_INTERVAL: Duration = Duration::from_millis(100);

/// 已确认段的保留窗口（只为可视化保留）。
pub const SEGMENT_RETENTION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    loss_rate: f64,
    delay: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: DEFAULT_LOSS_RATE,
            delay: DEFAULT_DELAY,
        }
    }
}

impl SimConfig {
    pub fn new(loss_rate: f64, delay: Duration) -> Self {
        let mut cfg = Self::default();
        cfg.set_loss_rate(loss_rate);
        cfg.set_delay(delay);
        cfg
    }

    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 钳制到 [0, 1]。
    pub fn set_loss_rate(&mut self, rate: f64) {
        self.loss_rate = rate.clamp(0.0, 1.0);
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }
}
