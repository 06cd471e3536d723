//! 协作白板服务器
//!
//! 接受客户端连接，转发聊天/白板/文件消息并维护历史。

use boardsim_rs::server::Hub;
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "board-server", about = "协作白板服务器：转发聊天/白板/文件消息")]
struct Args {
    /// 监听端口
    #[arg(long, default_value_t = 5050)]
    port: u16,
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

    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .expect("bind listen port");
    tracing::info!(port = args.port, "服务器开始监听");

    let hub = Hub::new();
    if let Err(e) = hub.run(listener).await {
        tracing::error!(error = %e, "服务器退出");
    }
}
