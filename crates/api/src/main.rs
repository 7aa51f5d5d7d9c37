use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelfetch_api::background::{cleanup, job_eviction};
use reelfetch_api::config::ServerConfig;
use reelfetch_api::router::build_app_router;
use reelfetch_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reelfetch_api=debug,reelfetch_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let mut config = ServerConfig::from_env().expect("Invalid configuration");
    config.download_dir = prepare_dir(&config.download_dir).await;
    config.cookies_dir = prepare_dir(&config.cookies_dir).await;
    tracing::info!(
        host = %config.host,
        port = %config.port,
        download_dir = %config.download_dir.display(),
        tool = %config.tool.program,
        "Loaded server configuration",
    );

    // --- App state (starts the job workers) ---
    let state = AppState::new(config.clone());
    let orchestrator = Arc::clone(&state.orchestrator);

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let cleanup_handle = cleanup::spawn(cleanup::CleanupSettings::from_config(&config), cancel.clone());

    let eviction_handle = tokio::spawn(job_eviction::run(
        Arc::clone(&orchestrator),
        Duration::from_secs(config.eviction_interval_secs),
        cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Stopping the workers fails in-flight jobs, which ends their progress
    // streams so open SSE connections can drain.
    let shutdown_orchestrator = Arc::clone(&orchestrator);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_orchestrator.shutdown();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    if let Some(handle) = cleanup_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), eviction_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Create `dir` if needed and return its absolute form.
///
/// The tool runs with the download directory as its working directory, so
/// every path handed to it (cookies file included) must be absolute.
async fn prepare_dir(dir: &Path) -> std::path::PathBuf {
    tokio::fs::create_dir_all(dir)
        .await
        .unwrap_or_else(|e| panic!("Failed to create {}: {e}", dir.display()));
    tokio::fs::canonicalize(dir)
        .await
        .unwrap_or_else(|e| panic!("Failed to resolve {}: {e}", dir.display()))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
