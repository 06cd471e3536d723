//! 拥塞控制状态机模块
//!
//! 纯状态容器 + 转移逻辑，不做任何 I/O；由仿真线束（`sim`）驱动。

mod controller;
mod stats;

pub use controller::{Algorithm, CongestionConfig, CongestionController, Phase, StatsObserver};
pub use stats::CongestionStats;
