use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod relay;
mod upstream;

use api::routes::{create_router, AppState};
use config::Config;
use relay::RelayPipeline;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Configuration from environment
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    for var in config.missing_credentials() {
        tracing::warn!("{} is not set; conversation requests will fail until it is", var);
    }

    let addr = config.server.socket_addr();

    tracing::info!("Voice Relay Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Language model: {}", config.generation.model);
    match &config.synthesis {
        Some(synthesis) => tracing::info!(
            "Speech backend: {} ({:?})",
            synthesis.backend.name(),
            synthesis.voice
        ),
        None => tracing::info!("Speech backend: none (text-only)"),
    }

    let relay = match RelayPipeline::from_config(&config) {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!("Failed to initialize relay: {}", e);
            std::process::exit(1);
        }
    };

    // Create app state
    let state = Arc::new(AppState { relay });

    // Create router
    let app = create_router(state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutting down");
}
