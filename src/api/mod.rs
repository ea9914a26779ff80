//! HTTP API for the donation platform
//!
//! This module provides the service's HTTP surface:
//! - Chart feeds (per-recipient history, site-wide volume)
//! - Account operations (create participant, pledge, fund, privacy)
//! - The payday trigger
//!
//! The chart feeds return bare JSON bodies with fixed wire shapes; the
//! account and admin endpoints use the `ApiResponse` envelope.

use crate::{App, PatronageError};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

mod charts;
mod health;
mod participants;
mod payday;

pub use charts::*;
pub use health::*;
pub use participants::*;
pub use payday::*;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// The application
    pub app: App,
}

/// Build the API router
pub fn router(app: App) -> Router {
    let state = ApiState { app };

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Chart feeds
        .route("/about/charts.json", get(site_charts))
        .route("/:username/charts.json", get(participant_charts))
        // Account operations
        .route("/participants.json", post(create_participant))
        .route("/:username/tip.json", post(set_tip))
        .route("/:username/exchange.json", post(record_exchange))
        .route("/:username/privacy.json", post(toggle_privacy))
        // Settlement trigger
        .route("/payday.json", post(run_payday))
        // Add state
        .with_state(state)
}

/// Start the HTTP API server
pub async fn serve(app: App) -> anyhow::Result<()> {
    serve_with_shutdown(app, tokio::sync::oneshot::channel().1).await
}

/// Start the HTTP API server with graceful shutdown
pub async fn serve_with_shutdown(
    app: App,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let config = app.config.clone();

    // Build the router
    let router = router(app);

    // Add CORS if enabled
    let router = if config.api.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    // Parse bind address
    let addr: std::net::SocketAddr = config
        .api
        .bind_address
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    info!("Starting HTTP API server on {}", addr);

    // Start the server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("Received shutdown signal, stopping API server...");
        })
        .await?;

    info!("API server stopped gracefully");
    Ok(())
}

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (only present if success is true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (only present if success is false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Convert PatronageError to HTTP status code
pub fn error_to_status_code(err: &PatronageError) -> StatusCode {
    match err {
        PatronageError::Validation(_) => StatusCode::BAD_REQUEST,
        PatronageError::NotFound(_) => StatusCode::NOT_FOUND,
        PatronageError::Forbidden(_) => StatusCode::FORBIDDEN,
        PatronageError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        PatronageError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PatronageError::Payday(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PatronageError::Api(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PatronageError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build an error response with the envelope body
pub(crate) fn error_response(err: PatronageError) -> Response {
    let status = error_to_status_code(&err);
    (status, Json(ApiResponse::<()>::error(err.to_string()))).into_response()
}

/// Caller identity established by the fronting auth proxy.
///
/// The service itself has no session system; a reverse proxy in front of
/// it authenticates users and forwards the username.
pub(crate) fn forwarded_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-user")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
