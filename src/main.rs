//! ShelfStore -- S3-compatible object storage server backed by the
//! local filesystem.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

/// Command-line arguments for the ShelfStore server.
#[derive(Parser, Debug)]
#[command(
    name = "shelfstore",
    version,
    about = "S3-compatible object storage server backed by the local filesystem"
)]
struct Cli {
    /// Path to the YAML configuration file.  Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the storage root directory.
    #[arg(short, long)]
    directory: Option<String>,

    /// Suppress all log output.
    #[arg(long)]
    silent: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => shelfstore::config::load_config(path)?,
        None => shelfstore::config::Config::default(),
    };
    if let Some(directory) = cli.directory {
        config.storage.root_dir = directory;
    }
    if cli.silent {
        config.logging.silent = true;
    }

    // Initialize tracing / logging.  `--silent` (or logging.silent)
    // turns the subscriber off entirely.
    let filter = if config.logging.silent {
        tracing_subscriber::EnvFilter::new("off")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize the object store over the local filesystem.
    let root = config.storage.root_dir.clone();
    let store = shelfstore::store::ObjectStore::new(
        &root,
        Arc::new(shelfstore::fs::local::LocalFilesystem::new()),
    );
    store.init().await?;
    info!("object store initialized at {}", root);

    let state = Arc::new(shelfstore::AppState { config, store });
    let app = shelfstore::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("ShelfStore listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new
    // connections and let in-flight requests finish.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ShelfStore shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful
/// shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
