//! Chart feed endpoints
//!
//! These are the platform's public chart data sources. Their wire shapes
//! are fixed: both return bare JSON arrays ordered most-recent-run-first.
//! The per-recipient feed carries native numbers; the site-wide feed
//! carries formatted strings (its consumer is a chart widget that plots
//! pre-formatted labels).

use super::{error_response, ApiState};
use crate::{
    db::{ParticipantQueries, PaydayQueries, TransferQueries},
    money,
    payday::receipts,
    PatronageError,
};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// One entry of a recipient's donation history
#[derive(Debug, Serialize)]
pub struct ReceiptChartEntry {
    /// Date of the settlement run (YYYY-MM-DD)
    pub date: String,
    /// Number of transfers received during the run
    pub npatrons: i64,
    /// Total amount received during the run
    pub receipts: f64,
}

/// Per-recipient donation history.
///
/// Returns an empty array for a recipient who never received funds, and
/// 403 for every caller (the recipient included) once the recipient has
/// anonymous receiving enabled.
pub async fn participant_charts(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> Response {
    info!("API: Receipt chart request for {}", username);

    let participants = ParticipantQueries::new(&state.app.db);
    let participant = match participants.get_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return error_response(PatronageError::NotFound(format!(
                "No such participant: {}",
                username
            )))
        }
        Err(e) => return error_response(PatronageError::Database(e.to_string())),
    };

    if participant.anonymous_receiving {
        return error_response(PatronageError::Forbidden(
            "This participant receives anonymously".to_string(),
        ));
    }

    let paydays = match PaydayQueries::new(&state.app.db).list_closed().await {
        Ok(p) => p,
        Err(e) => return error_response(PatronageError::Database(e.to_string())),
    };
    let transfers = match TransferQueries::new(&state.app.db)
        .list_for_tippee(participant.id)
        .await
    {
        Ok(t) => t,
        Err(e) => return error_response(PatronageError::Database(e.to_string())),
    };

    let entries: Vec<ReceiptChartEntry> = receipts::receipt_history(&paydays, &transfers)
        .into_iter()
        .map(|e| ReceiptChartEntry {
            date: e.ts_start.format("%Y-%m-%d").to_string(),
            npatrons: e.npatrons,
            receipts: money::to_f64(e.receipts),
        })
        .collect();

    Json(entries).into_response()
}

/// One entry of the site-wide transfer-volume series
#[derive(Debug, Serialize)]
pub struct SiteChartEntry {
    /// Date of the settlement run (YYYY-MM-DD)
    pub date: String,
    /// Pledge-driven transfer volume for the run
    pub weekly_gifts: String,
    /// Funds drawn from external sources during the run
    pub charges: String,
    /// Funds paid out externally during the run
    pub withdrawals: String,
    /// Participants active during the run
    pub active_users: String,
    /// Total accounts at the run's close
    pub total_users: String,
    /// Lifetime transfer volume through this run
    pub total_gifts: String,
    /// Current date label for the chart axis (not run-specific)
    #[serde(rename = "xTitle")]
    pub x_title: String,
}

/// Site-wide per-run statistics
pub async fn site_charts(State(state): State<ApiState>) -> Response {
    info!("API: Site chart request");

    let paydays = match PaydayQueries::new(&state.app.db).list_closed().await {
        Ok(p) => p,
        Err(e) => return error_response(PatronageError::Database(e.to_string())),
    };

    let x_title = Utc::now().format("%Y-%m-%d").to_string();
    let entries: Vec<SiteChartEntry> = receipts::site_history(&paydays)
        .into_iter()
        .map(|row| SiteChartEntry {
            date: row.ts_start.format("%Y-%m-%d").to_string(),
            weekly_gifts: money::format_amount(row.transfer_volume),
            charges: money::format_amount(row.charge_volume),
            withdrawals: money::format_amount(row.withdrawal_volume),
            active_users: row.nactive.to_string(),
            total_users: row.nparticipants.to_string(),
            total_gifts: money::format_amount(row.cumulative_volume),
            x_title: x_title.clone(),
        })
        .collect();

    Json(entries).into_response()
}
