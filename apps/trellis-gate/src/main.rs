mod cli;
mod handlers;
mod registry;
mod viewer;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use trellis_client::Config;

use crate::cli::{Cli, Commands};
use crate::handlers::{AppState, SharedState};
use crate::registry::ArtifactRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Config::load(args.config.as_deref());
    let _log_guard = init_tracing(&config);

    match args.command {
        Some(Commands::Process(process)) => cli::run_process(&config, process).await,
        Some(Commands::Status {
            session_id,
            task_id,
        }) => cli::run_status(&config, session_id, task_id).await,
        Some(Commands::Presets) => {
            cli::run_presets(&config);
            Ok(())
        }
        None => serve(config, args.port).await,
    }
}

async fn serve(config: Config, port: u16) -> Result<()> {
    let state: SharedState = Arc::new(AppState {
        registry: ArtifactRegistry::from_config(&config),
    });
    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/trellis/model/:id", get(handlers::get_model))
        .route("/trellis/video/:id", get(handlers::get_video))
        .route("/trellis/view-model/:id", get(handlers::view_model))
        .route("/trellis/view-video/:id", get(handlers::view_video))
        .route("/trellis/exists/:id", get(handlers::exists))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    info!("artifact server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// RUST_LOG wins over the configured level. When a log file is configured
/// the returned guard must stay alive for the writer to flush.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match &config.logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "trellis-gate.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
