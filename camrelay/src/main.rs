mod intake;
mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use camrelay_core::{auth::PasswordGate, logging, Config};
use camrelay_stream::{SocketListener, SocketListenerConfig, StreamMultiplexer};

use server::AppState;

#[derive(Parser)]
#[command(name = "camrelay", about = "Relay a local camera feed to HTTP viewers")]
struct Args {
    /// Configuration file (defaults to ./config.toml, all keys optional)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    logging::init_logging(&config.logging)?;
    info!("CamRelay starting...");
    info!("HTTP address: {}", config.server.http_addr);

    let cancel = CancellationToken::new();

    let mux = Arc::new(StreamMultiplexer::new(
        config.server.http_addr.clone(),
        Vec::new(),
    )?);

    let listener_config = SocketListenerConfig {
        max_accept_failures: config.socket.max_accept_failures,
        accept_backoff: Duration::from_millis(config.socket.accept_backoff_ms),
    };
    let handoff = SocketListener::start(&config.socket.path, listener_config, cancel.clone())?;
    info!(
        "rendezvous socket: {}",
        handoff.socket_path().display()
    );

    let intake = tokio::spawn(intake::run(
        handoff,
        Arc::clone(&mux),
        config.stream.clone(),
    ));

    let state = AppState {
        mux: Arc::clone(&mux),
        gate: Arc::new(PasswordGate::from_env(&config.auth)),
        read_chunk: config.stream.read_chunk_bytes,
    };
    let app = server::router(state);

    let http = tokio::net::TcpListener::bind(&config.server.http_addr).await?;
    axum::serve(http, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    cancel.cancel();
    if let Err(e) = intake.await {
        error!("intake task failed: {e}");
    }
    mux.force_close().await;
    info!("CamRelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install Ctrl-C handler: {e}");
        return;
    }
    info!("received shutdown signal");
}
