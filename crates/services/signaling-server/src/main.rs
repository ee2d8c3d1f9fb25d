//! Signaling server binary entry point
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8000)
//! cargo run -p huddle-signaling-server
//!
//! # Custom address, JSON logs
//! cargo run -p huddle-signaling-server -- \
//!   --bind-address 127.0.0.1:9000 \
//!   --log-json
//! ```

use anyhow::Context;
use clap::Parser;
use huddle_signaling_server::{ServerConfig, SignalingServer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Huddle signaling server
///
/// Room membership, SDP/ICE relay and note fan-out over WebSocket.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to accept WebSocket connections on
    #[arg(long, default_value = "0.0.0.0:8000", env = "HUDDLE_BIND_ADDRESS")]
    bind_address: SocketAddr,

    /// Largest text frame accepted from a client, in bytes
    #[arg(long, default_value_t = 65536, env = "HUDDLE_MAX_MESSAGE_BYTES")]
    max_message_bytes: usize,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false, env = "HUDDLE_LOG_JSON")]
    log_json: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind_address: args.bind_address,
            max_message_bytes: args.max_message_bytes,
            log_json: args.log_json,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        if shutdown_flag_handler.swap(true, Ordering::SeqCst) {
            eprintln!("Shutdown already in progress, forcing exit");
            std::process::exit(0);
        }
        eprintln!("\nCtrl+C received, shutting down...");
    })
    .context("Failed to set Ctrl+C handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("huddle-worker")
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async_main(args.into(), shutdown_flag))
}

async fn async_main(config: ServerConfig, shutdown_flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    init_tracing(config.log_json);

    info!(
        version = huddle_signaling_server::version(),
        bind_address = %config.bind_address,
        max_message_bytes = config.max_message_bytes,
        "Huddle signaling server starting"
    );

    let server = SignalingServer::new(config).context("Invalid server configuration")?;
    let handle = server
        .start()
        .await
        .context("Failed to start signaling server")?;

    while !shutdown_flag.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    info!("Shutdown signal received, stopping accept loop...");
    handle.shutdown().await;
    info!("Signaling server shut down gracefully");

    Ok(())
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}
