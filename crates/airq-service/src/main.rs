//! airq-service - HTTP API for device telemetry.
//!
//! Run with: `cargo run -p airq-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use airq_service::{AppState, Backend, Config, api};

/// airq-service - HTTP API for PM2.5/PM10 device telemetry.
#[derive(Parser, Debug)]
#[command(name = "airq-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Keep readings in memory only.
    #[arg(long)]
    memory: bool,

    /// Classification table file (overrides config).
    #[arg(long)]
    classification: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airq_service=info".parse()?)
                .add_directive("airq_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    if args.memory {
        config.storage.backend = Backend::Memory;
    }
    if let Some(table) = args.classification {
        config.classification.path = Some(table);
    }
    config.validate()?;

    let table = config.classification.load_table()?;
    match &config.classification.path {
        Some(path) => info!("Loaded classification table from {}", path.display()),
        None => info!("Using built-in classification table"),
    }

    let store = config.storage.open(Arc::new(table))?;
    if config.storage.backend == Backend::Memory {
        info!("Using in-memory storage; readings will not survive a restart");
    }

    let addr: SocketAddr = config.server.bind.parse()?;
    let state = AppState::new(store, config);

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
