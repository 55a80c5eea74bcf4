use clap::Parser;
use rtmp_mux::sessions::{Applications, ServerConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod controller;
mod listener;

use crate::controller::LoggingController;
use crate::listener::accept_connections;

/// Accepts RTMP connections and serves each one on its own task
#[derive(Parser, Debug)]
#[command(name = "rtmp-mux-server", about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "RTMP_BIND", default_value = "0.0.0.0:1935")]
    bind: String,

    /// Outbound chunk size announced after connect
    #[arg(long, env = "RTMP_CHUNK_SIZE", default_value_t = 4096)]
    chunk_size: u32,

    /// Window acknowledgement size announced after connect
    #[arg(long, env = "RTMP_WINDOW_ACK_SIZE", default_value_t = 2_500_000)]
    window_ack_size: u32,

    /// Peer bandwidth announced after connect
    #[arg(long, env = "RTMP_PEER_BANDWIDTH", default_value_t = 2_500_000)]
    peer_bandwidth: u32,

    /// App names clients may connect to (repeatable)
    #[arg(long = "app", env = "RTMP_APPS", value_delimiter = ',', default_value = "live")]
    apps: Vec<String>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new();
        config.chunk_size = self.chunk_size;
        config.window_ack_size = self.window_ack_size;
        config.peer_bandwidth = self.peer_bandwidth;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = cli.server_config();

    let applications = Arc::new(Applications::new());
    for app in &cli.apps {
        applications.register(app, Arc::new(LoggingController::new(app)));
    }

    let listener = TcpListener::bind(&cli.bind).await?;
    info!(bind = %cli.bind, apps = ?cli.apps, "Listening for connections");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
        signal.cancel();
    });

    accept_connections(listener, config, applications, shutdown).await;
    Ok(())
}
