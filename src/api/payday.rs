//! Settlement trigger endpoint

use super::{error_response, ApiResponse, ApiState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::info;

/// Execute a settlement run.
///
/// Runs are serialized: a second request issued while a run is in
/// progress waits for the first to finish. The run commits atomically,
/// so the chart feeds never observe partial results.
pub async fn run_payday(State(state): State<ApiState>) -> axum::response::Response {
    info!("API: Payday trigger");

    match state.app.payday.run().await {
        Ok(report) => {
            info!(
                "API: Payday {} complete: {} transfers, volume={}",
                report.payday_id, report.ntransfers, report.transfer_volume
            );
            (StatusCode::OK, Json(ApiResponse::success(report))).into_response()
        }
        Err(e) => error_response(e),
    }
}
