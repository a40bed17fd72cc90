//! Application startup and lifecycle management.
//!
//! Builds the HTTP router (question endpoint plus health/metrics) and runs it
//! until a shutdown signal arrives.

use crate::config::TutorConfig;
use crate::handlers::{ask::ask, health};
use crate::services::providers::azure_openai::AzureOpenAiProvider;
use crate::services::providers::ChatProvider;
use crate::services::TutorService;
use axum::{extract::DefaultBodyLimit, middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{http_request_span, request_id_middleware},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TutorConfig>,
    pub tutor: TutorService,
}

impl AppState {
    pub fn new(config: TutorConfig, provider: Arc<dyn ChatProvider>) -> Self {
        let tutor = TutorService::new(provider, &config);
        Self {
            config: Arc::new(config),
            tutor,
        }
    }
}

/// Build the HTTP router for `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/api/ask", get(ask).post(ask))
        .route("/api/ItsoTutorMain", get(ask).post(ask))
        // Questions are forwarded whatever their length
        .layer(DefaultBodyLimit::disable())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the Azure OpenAI provider.
    pub async fn build(config: TutorConfig) -> Result<Self, AppError> {
        let provider = AzureOpenAiProvider::new(&config.chat, config.provider.timeout)
            .map_err(|e| {
                tracing::error!("Failed to create Azure OpenAI provider: {}", e);
                AppError::ConfigError(anyhow::anyhow!("provider initialization failed: {}", e))
            })?;

        tracing::info!(
            endpoint = %config.chat.endpoint,
            deployment = %config.chat.deployment,
            index = %config.search.index_name,
            timeout_secs = config.provider.timeout.as_secs(),
            max_retries = config.provider.max_retries,
            "Initialized Azure OpenAI provider"
        );

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: TutorConfig,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self, AppError> {
        // Bind HTTP listener (port 0 = random port for testing)
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Tutor service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state: AppState::new(config, provider),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
