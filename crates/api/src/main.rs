use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bookvision_core::document::InMemoryDocumentStore;
use bookvision_core::transform::tool::TransformTool;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookvision_api::background;
use bookvision_api::config::ServerConfig;
use bookvision_api::router::build_app_router;
use bookvision_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bookvision_api=debug,bookvision_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Transform tool ---
    let tool = TransformTool {
        program: config.transform.tool.clone(),
        leading_args: config.transform.tool_args.clone(),
        tool_path_override: config.transform.tool_path_override.clone(),
        timeout: config.transform.timeout,
    };
    tracing::info!(
        program = %tool.program,
        timeout_secs = tool.timeout.as_secs(),
        max_concurrent_jobs = config.transform.max_concurrent_jobs,
        "Transform tool configured",
    );

    // --- App state ---
    let state = AppState::new(
        config.clone(),
        Arc::new(tool),
        Arc::new(InMemoryDocumentStore::new()),
    );

    // --- Storage ---
    state
        .layout
        .ensure_roots()
        .await
        .expect("Failed to create storage directories");
    tracing::info!(
        uploads = %state.layout.upload_root().display(),
        output = %state.layout.output_root().display(),
        "Storage directories ready",
    );

    // --- Job retention sweeper ---
    let retention_cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(background::job_retention::run(
        Arc::clone(&state.tracker),
        config.transform.job_retention,
        retention_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state.clone(), &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Requests holding `wait=true` uploads only finish once their job does,
    // so jobs are cancelled as soon as the signal arrives.
    let dispatcher = Arc::clone(&state.dispatcher);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            dispatcher.cancel_all();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if state.dispatcher.drain(grace).await {
        tracing::info!("Job dispatcher drained");
    }

    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Job retention sweeper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
