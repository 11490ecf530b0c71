//! stemchat-server - interactive audio separation service
//!
//! Serves the chat page, the `/ws` session endpoint and the upload/download
//! API. Uploaded files live in `<root>/uploaded_files`, separation results in
//! `<root>/processed_files`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stemchat_common::config::{resolve_root_folder, StoragePaths, TomlConfig, DEFAULT_PORT};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stemchat_server::services::{CommandRunner, FileStore, VocaDbClient};
use stemchat_server::session::SessionSettings;
use stemchat_server::AppState;

/// Command-line arguments for stemchat-server
#[derive(Parser, Debug)]
#[command(name = "stemchat-server")]
#[command(about = "Interactive audio separation service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "STEMCHAT_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "STEMCHAT_HOST")]
    host: Option<String>,

    /// Root folder holding uploaded and processed files
    #[arg(short, long, env = "STEMCHAT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "STEMCHAT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stemchat_server={level},stemchat_common={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stemchat-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    info!("Root folder: {}", root_folder.display());

    let store = FileStore::new(StoragePaths::under(&root_folder))
        .context("Failed to initialize file store")?;

    let runner = CommandRunner::new(&config.separation, &store);
    info!(
        "Separation command: {} {}",
        config.separation.program,
        config.separation.args.join(" ")
    );

    let lookup = VocaDbClient::new(&config.lookup).context("Failed to create lookup client")?;
    info!("Song lookup: {}", config.lookup.base_url);

    let state = AppState::new(
        Arc::new(store),
        Arc::new(runner),
        Arc::new(lookup),
        SessionSettings::from(&config.session),
    );

    let app = stemchat_server::build_router(state);

    let host = args
        .host
        .or(config.host.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{}", addr);
    info!("Session endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
