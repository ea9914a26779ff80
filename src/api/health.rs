//! Health check endpoints

use super::{ApiResponse, ApiState};
use axum::{extract::State, response::Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Instance name
    pub service: String,
    /// Database reachability
    pub database_connected: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    // Check database reachability
    let database_connected = {
        let conn_lock = state.app.db.conn();
        let conn = conn_lock.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: state.app.config.service.name.clone(),
        database_connected,
    };

    Json(ApiResponse::success(response))
}
