use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auditflow_api::config::{OrchestratorConfig, ServerConfig};
use auditflow_api::orchestrator::JobOrchestrator;
use auditflow_api::router::build_app_router;
use auditflow_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auditflow_api=debug,auditflow_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let orchestrator_config = OrchestratorConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        data_dir = %orchestrator_config.data_dir.display(),
        manifest = ?orchestrator_config.script_manifest,
        "Loaded orchestrator configuration",
    );

    // --- Orchestrator ---
    let registry = orchestrator_config
        .load_registry()
        .context("Failed to load script registry")?;
    let orchestrator = Arc::new(
        JobOrchestrator::open(&orchestrator_config, registry)
            .await
            .context("Failed to open results index")?,
    );

    // Probe once at startup so a missing interpreter shows up in the logs
    // early. Runs re-probe until one is found.
    if let Err(e) = orchestrator.interpreter().await {
        tracing::warn!(error = %e, "No worker interpreter available yet");
    }

    // --- App state ---
    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Runs cannot be cancelled; their workers keep going without us.
    let in_flight = orchestrator.active_runs();
    if in_flight > 0 {
        tracing::warn!(in_flight, "Shutting down with runs still in flight");
    }
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
