//! HTTP server for the counterparty relay
//!
//! Exposes `POST /execute-swap` to user clients plus liveness and health
//! endpoints.
//!
//! ## Production Features
//!
//! - Graceful shutdown on SIGTERM/SIGINT with a bounded drain
//! - Request timeout middleware
//! - CORS configuration

use crate::{HealthResponse, RelayError, RelayService};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use gasless_core::api::{ExecuteSwapRequest, ExecuteSwapResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Enable CORS
    pub cors_enabled: bool,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum time to drain in-flight requests after a shutdown signal
    pub shutdown_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cors_enabled: true,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl RelayConfig {
    /// Set request timeout
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set shutdown timeout
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    /// Disable CORS
    pub fn without_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<RelayService>,
    /// Service start time
    pub started_at: Instant,
    pub config: RelayConfig,
}

/// Relay HTTP server
pub struct RelayServer {
    state: Arc<AppState>,
}

impl RelayServer {
    pub fn new(service: Arc<RelayService>, config: RelayConfig) -> Self {
        Self {
            state: Arc::new(AppState {
                service,
                started_at: Instant::now(),
                config,
            }),
        }
    }

    pub fn service(&self) -> &Arc<RelayService> {
        &self.state.service
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);
        let timeout = Duration::from_secs(self.state.config.request_timeout_secs);

        let mut router = Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/execute-swap", post(execute_swap))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        timeout,
                    )),
            )
            .with_state(state);

        if self.state.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Serve until SIGINT/SIGTERM, then drain for at most the shutdown timeout
    pub async fn serve(self, addr: impl Into<SocketAddr>) -> anyhow::Result<()> {
        let addr = addr.into();
        let shutdown_timeout = Duration::from_secs(self.state.config.shutdown_timeout_secs);

        info!(
            address = %addr,
            backend = %self.state.service.address(),
            "Starting relay service"
        );

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let server = async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    let _ = stop_tx.send(true);
                })
                .await
        };
        let drain_deadline = async move {
            if stop_rx.changed().await.is_ok() {
                tokio::time::sleep(shutdown_timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = server => result?,
            _ = drain_deadline => {
                warn!(timeout_secs = shutdown_timeout.as_secs(), "Drain timed out, dropping in-flight requests");
            }
        }

        info!("Relay service stopped");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// API error rendered as a failed [`ExecuteSwapResponse`]
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn from_relay_error(e: RelayError) -> Self {
        Self {
            status: StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: e.code(),
            message: e.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ExecuteSwapResponse::failed(self.code, self.message));
        (self.status, body).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self::from_relay_error(e)
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn root() -> &'static str {
    "gasless relay ok"
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend_address: state.service.address().to_checksum(None),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        stats: state.service.stats(),
    })
}

/// Body is parsed by hand so malformed JSON maps to `invalid_request`
async fn execute_swap(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ExecuteSwapResponse>, ApiError> {
    let request: ExecuteSwapRequest = serde_json::from_slice(&body)
        .map_err(|e| RelayError::InvalidRequest(format!("malformed body: {}", e)))?;
    let response = state.service.execute_swap(request).await?;
    Ok(Json(response))
}
