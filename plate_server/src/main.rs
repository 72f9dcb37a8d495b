use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use plate_common::uploader::ArtifactUploader;
use plate_common::Config;
use plate_server::{build_router, AppState};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plate_server", about = "Upload, scan and compare traffic videos over HTTP")]
struct Cli {
    /// TOML configuration file, also handed to the scanner.
    #[arg(long, env = "PLATE_WATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!("plate_server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let uploader = ArtifactUploader::from_config(&config.storage).await;
    if !uploader.is_enabled() {
        tracing::info!("no storage bucket configured, artifacts stay local");
    }
    let state = AppState::new(&config, cli.config.as_deref(), uploader);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
