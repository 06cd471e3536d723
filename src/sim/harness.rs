//! 仿真线束（actor + 发送 worker）
//!
//! actor 独占 [`SimCore`]，在一个 `select!` 循环里串行处理命令与三个
//! 周期定时器；真实消息经专职的单飞 worker 施加（有上限的）仿真时延后
//! 原样投递给会话传输层，之后抽签决定是否“丢包”。
//! 关停后仍调用 `send_message` 会得到 [`Error::Closed`]。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};

use crate::cc::{Algorithm, CongestionStats, StatsObserver};
use crate::error::{Error, Result};
use crate::proto::Message;
use crate::session::Session;
use crate::sim::{
    SimConfig, SimCore, ACK_INTERVAL, MAX_SEND_DELAY, STATS_PUSH_INTERVAL, TIMEOUT_SCAN_INTERVAL,
};

/// 真实消息的去向（通常就是会话传输层）。投递必须非阻塞。
pub trait MessageSink: Send + Sync + 'static {
    fn deliver(&self, msg: Message);
}

impl MessageSink for Session {
    fn deliver(&self, msg: Message) {
        self.enqueue(msg);
    }
}

enum Cmd {
    Send(Message),
    /// 发送 worker 回报：这批段在抽签中“丢了”
    Lost(Vec<u64>),
    SetLossRate(f64),
    SetDelay(Duration),
    SetObserver(Option<StatsObserver>),
    Shutdown,
}

struct Outbound {
    msg: Message,
    seqs: Vec<u64>,
    delay: Duration,
    loss_rate: f64,
}

/// 仿真线束句柄。克隆即共享同一个 actor。
#[derive(Clone)]
pub struct CongestionSim {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    stats_rx: watch::Receiver<CongestionStats>,
    closed: Arc<AtomicBool>,
}

impl CongestionSim {
    pub fn spawn(algorithm: Algorithm, config: SimConfig, sink: Arc<dyn MessageSink>) -> Self {
        let core = SimCore::new(algorithm, config);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(core.stats());

        tokio::spawn(send_worker(out_rx, sink, cmd_tx.clone()));
        tokio::spawn(actor(core, cmd_rx, out_tx, stats_tx));

        Self {
            cmd_tx,
            stats_rx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 拦截一次应用发送：切段、驱动状态机，并把真实消息转给发送 worker。
    pub fn send_message(&self, msg: Message) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        self.cmd_tx.send(Cmd::Send(msg)).map_err(|_| Error::Closed)
    }

    /// 运行期可改；下个调度周期生效。越界钳制。
    pub fn set_loss_rate(&self, rate: f64) {
        let _ = self.cmd_tx.send(Cmd::SetLossRate(rate));
    }

    pub fn set_delay(&self, delay: Duration) {
        let _ = self.cmd_tx.send(Cmd::SetDelay(delay));
    }

    pub fn set_observer(&self, observer: Option<StatsObserver>) {
        let _ = self.cmd_tx.send(Cmd::SetObserver(observer));
    }

    /// 最近一次推送的统计快照。
    pub fn stats(&self) -> CongestionStats {
        self.stats_rx.borrow().clone()
    }

    /// 停掉定时器与发送 worker。幂等。
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.send(Cmd::Shutdown);
    }
}

/// 单飞发送 worker：一次只有一个真实发送在途。
async fn send_worker(
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    sink: Arc<dyn MessageSink>,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
) {
    let mut rng = StdRng::from_entropy();
    while let Some(out) = rx.recv().await {
        // 发送前施加有上限的仿真网络时延
        let delay = out.delay.min(MAX_SEND_DELAY);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        sink.deliver(out.msg);

        // 发送后抽签：判“丢”则立刻回报给 actor 按超时处理
        if rng.r#gen::<f64>() < out.loss_rate {
            tracing::debug!(segments = out.seqs.len(), "仿真丢包");
            let _ = cmd_tx.send(Cmd::Lost(out.seqs));
        }
    }
}

async fn actor(
    mut core: SimCore,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    out_tx: mpsc::UnboundedSender<Outbound>,
    stats_tx: watch::Sender<CongestionStats>,
) {
    let mut rng = StdRng::from_entropy();
    let mut observer: Option<StatsObserver> = None;
    let mut ack_timer = tokio::time::interval(ACK_INTERVAL);
    let mut rto_timer = tokio::time::interval(TIMEOUT_SCAN_INTERVAL);
    let mut stats_timer = tokio::time::interval(STATS_PUSH_INTERVAL);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None | Some(Cmd::Shutdown) => break,
                Some(Cmd::Send(msg)) => {
                    // 段数按编码后的消息体字节数计
                    let byte_len = serde_json::to_vec(&msg).map(|b| b.len()).unwrap_or(0);
                    let seqs = core.register_send(byte_len, Instant::now());
                    let cfg = core.config();
                    let _ = out_tx.send(Outbound {
                        msg,
                        seqs,
                        delay: cfg.delay(),
                        loss_rate: cfg.loss_rate(),
                    });
                }
                Some(Cmd::Lost(seqs)) => core.mark_lost(&seqs),
                Some(Cmd::SetLossRate(rate)) => core.set_loss_rate(rate),
                Some(Cmd::SetDelay(delay)) => core.set_delay(delay),
                Some(Cmd::SetObserver(obs)) => {
                    observer = obs.clone();
                    core.set_observer(obs);
                }
            },
            _ = ack_timer.tick() => core.simulate_acks(Instant::now(), &mut rng),
            _ = rto_timer.tick() => core.check_timeouts(Instant::now()),
            _ = stats_timer.tick() => {
                // 无论有没有变化都推，消费端才能画出连续时间线
                let snapshot = core.stats();
                let _ = stats_tx.send(snapshot.clone());
                if let Some(cb) = &observer {
                    cb(&snapshot);
                }
            }
        }
    }
    // 循环退出即丢弃 out_tx：发送 worker 的 recv 返回 None，随之结束
}
