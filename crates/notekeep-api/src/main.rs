//! notekeep API Server
//!
//! Usage:
//!   notekeep-api [--config <file>] [--host <host>] [--port <port>] [--in-memory]

use anyhow::Context;
use clap::Parser;
use notekeep_api::{create_router, state::AppState};
use notekeep_core::config::AppConfig;
use notekeep_core::{MemoryStore, PgStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notekeep-api")]
#[command(about = "Note-taking API server")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep all data in process memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},notekeep_api={level},notekeep_core={level},tower_http=info,audit=info",
            level = config.logging.level
        ))
    });

    if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Invalid configuration")?;

    init_tracing(&config);
    tracing::info!(environment = %config.environment, "Configuration loaded");

    let state = if cli.in_memory {
        tracing::warn!("Using in-memory store; data is lost on exit");
        let store = Arc::new(MemoryStore::new());
        AppState::new(config, store.clone(), store)
    } else {
        let store = PgStore::connect(&config.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        store.migrate().await?;
        let store = Arc::new(store);
        AppState::new(config, store.clone(), store)
    };

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("notekeep API server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
