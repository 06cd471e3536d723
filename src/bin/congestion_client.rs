//! 拥塞仿真客户端（无界面）
//!
//! 连接白板服务器，按固定节奏发聊天消息，经仿真线束驱动 Tahoe/Reno
//! 状态机，并把观察者收到的统计时间线写成 JSON（可喂给图表页面）。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardsim_rs::cc::{Algorithm, CongestionStats};
use boardsim_rs::proto::{Message, MessageKind};
use boardsim_rs::session::{Session, SessionEvents};
use boardsim_rs::sim::{CongestionSim, SimConfig};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpStream;

#[derive(Debug, Parser)]
#[command(
    name = "congestion-client",
    about = "拥塞仿真客户端：边发聊天消息边记录 Tahoe/Reno 窗口轨迹"
)]
struct Args {
    /// 服务器地址
    #[arg(long, default_value = "127.0.0.1:5050")]
    addr: String,

    /// 显示名
    #[arg(long, default_value = "observer")]
    name: String,

    /// 拥塞算法（tahoe / reno）
    #[arg(long, default_value = "reno")]
    algorithm: Algorithm,

    /// 仿真丢包率 [0,1]
    #[arg(long, default_value_t = 0.02)]
    loss_rate: f64,

    /// 仿真网络时延（毫秒）
    #[arg(long, default_value_t = 50)]
    delay_ms: u64,

    /// 要发送的聊天消息条数
    #[arg(long, default_value_t = 200)]
    messages: u32,

    /// 发送间隔（毫秒）
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// 统计时间线输出文件（JSON）；不填则不生成
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

/// 客户端侧只观察入站消息，不参与分发。
struct ClientEvents;

impl SessionEvents for ClientEvents {
    fn on_message(&self, _client_id: u64, msg: Message) {
        match msg.kind {
            MessageKind::Welcome => {
                tracing::info!(payload = ?msg.payload, "收到 WELCOME");
            }
            kind => tracing::trace!(?kind, "收到消息"),
        }
    }

    fn on_disconnect(&self, _client_id: u64) {
        tracing::warn!("与服务器的连接已断开");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let stream = TcpStream::connect(&args.addr).await.expect("connect server");
    stream.set_nodelay(true).ok();

    let session = Session::spawn(0, stream, Arc::new(ClientEvents));
    let sim = CongestionSim::spawn(
        args.algorithm,
        SimConfig::new(args.loss_rate, Duration::from_millis(args.delay_ms)),
        session.clone(),
    );

    // 观察者收每一次状态变化与周期快照，攒成时间线
    let timeline: Arc<Mutex<Vec<CongestionStats>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = timeline.clone();
    sim.set_observer(Some(Arc::new(move |s: &CongestionStats| {
        sink.lock().expect("timeline lock").push(s.clone());
    })));

    sim.send_message(Message::with_field(
        MessageKind::Hello,
        "name",
        json!(args.name),
    ))
    .expect("send hello");

    for i in 0..args.messages {
        let mut payload = serde_json::Map::new();
        payload.insert("from".into(), json!(args.name));
        payload.insert("text".into(), json!(format!("message #{i}")));
        sim.send_message(Message::new(MessageKind::Chat, payload))
            .expect("send chat");
        tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    }

    // 给尾部的 ACK 仿真一点收敛时间
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stats = sim.stats();
    println!(
        "done: algorithm={:?}, cwnd={}, ssthresh={}, phase={:?}, rtt_ms={}, sent={}, acked={}, timeouts={}, dup_acks={}, rounds={}",
        stats.algorithm,
        stats.cwnd,
        stats.ssthresh,
        stats.phase,
        stats.rtt_ms,
        stats.sent,
        stats.acked,
        stats.timeouts,
        stats.dup_acks_total,
        stats.round
    );

    if let Some(path) = args.stats_json {
        let timeline = timeline.lock().expect("timeline lock");
        let json = serde_json::to_string_pretty(&*timeline).expect("serialize stats timeline");
        std::fs::write(&path, json).expect("write stats json");
        eprintln!("wrote stats timeline to {}", path.display());
    }

    sim.shutdown();
    session.close();
}
