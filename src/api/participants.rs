//! Account endpoints: participants, pledges, funding, privacy

use super::{error_response, error_to_status_code, forwarded_user, ApiResponse, ApiState};
use crate::{
    db::{ExchangeQueries, ParticipantQueries, TipQueries},
    money, PatronageError,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Create a participant
#[derive(Debug, Deserialize)]
pub struct CreateParticipantRequest {
    /// Desired username
    pub username: String,
}

/// Participant creation response
#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    /// Participant ID
    pub id: i64,
    /// Username
    pub username: String,
}

fn validate_username(username: &str) -> Result<(), PatronageError> {
    if username.is_empty() || username.len() > 32 {
        return Err(PatronageError::Validation(
            "Usernames must be between 1 and 32 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(PatronageError::Validation(format!(
            "Invalid username: {:?}",
            username
        )));
    }
    Ok(())
}

/// Create a participant
pub async fn create_participant(
    State(state): State<ApiState>,
    Json(req): Json<CreateParticipantRequest>,
) -> impl IntoResponse {
    info!("API: Create participant: username={}", req.username);

    if let Err(e) = validate_username(&req.username) {
        let status = error_to_status_code(&e);
        return (status, Json(ApiResponse::error(e.to_string())));
    }

    let participants = ParticipantQueries::new(&state.app.db);

    // The UNIQUE constraint is the real guard; this check exists to give
    // a clean 400 instead of a constraint error.
    match participants.get_by_username(&req.username).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!(
                    "Username already taken: {}",
                    req.username
                ))),
            )
        }
        Ok(None) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }

    match participants.create(&req.username).await {
        Ok(p) => (
            StatusCode::OK,
            Json(ApiResponse::success(ParticipantResponse {
                id: p.id,
                username: p.username,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// Set a pledge
#[derive(Debug, Deserialize)]
pub struct SetTipRequest {
    /// Pledge amount per settlement run, as a decimal string
    pub amount: String,
}

/// Pledge response
#[derive(Debug, Serialize)]
pub struct SetTipResponse {
    /// Pledging username
    pub tipper: String,
    /// Receiving username
    pub tippee: String,
    /// Recorded amount, as a two-decimal string
    pub amount: String,
}

/// Record a pledge from the caller to `:username`.
///
/// The new pledge supersedes any prior pledge for the pair; an amount of
/// zero cancels. Amounts are validated against the configured limits.
pub async fn set_tip(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SetTipRequest>,
) -> axum::response::Response {
    let caller = match forwarded_user(&headers) {
        Some(c) => c,
        None => {
            return error_response(PatronageError::Unauthorized(
                "Pledging requires a caller identity".to_string(),
            ))
        }
    };

    info!(
        "API: Tip request: tipper={}, tippee={}, amount={}",
        caller, username, req.amount
    );

    let amount = match money::parse_amount(&req.amount) {
        Ok(a) => a,
        Err(e) => return error_response(e),
    };
    if amount < 0 {
        return error_response(PatronageError::Validation(
            "Pledge amounts cannot be negative".to_string(),
        ));
    }
    let max_tip = state.app.config.max_tip_cents();
    if amount > max_tip {
        return error_response(PatronageError::Validation(format!(
            "Pledge exceeds the maximum of {}",
            money::format_amount(max_tip)
        )));
    }
    let min_tip = state.app.config.min_tip_cents();
    if amount != 0 && amount < min_tip {
        return error_response(PatronageError::Validation(format!(
            "Pledge is below the minimum of {}",
            money::format_amount(min_tip)
        )));
    }

    let participants = ParticipantQueries::new(&state.app.db);
    let tipper = match participants.get_by_username(&caller).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return error_response(PatronageError::NotFound(format!(
                "No such participant: {}",
                caller
            )))
        }
        Err(e) => return error_response(PatronageError::Database(e.to_string())),
    };
    let tippee = match participants.get_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return error_response(PatronageError::NotFound(format!(
                "No such participant: {}",
                username
            )))
        }
        Err(e) => return error_response(PatronageError::Database(e.to_string())),
    };

    if tipper.id == tippee.id {
        return error_response(PatronageError::Validation(
            "Participants cannot pledge to themselves".to_string(),
        ));
    }

    match TipQueries::new(&state.app.db)
        .set(tipper.id, tippee.id, amount)
        .await
    {
        Ok(tip) => (
            StatusCode::OK,
            Json(ApiResponse::success(SetTipResponse {
                tipper: tipper.username,
                tippee: tippee.username,
                amount: money::format_amount(tip.amount),
            })),
        )
            .into_response(),
        Err(e) => error_response(PatronageError::Database(e.to_string())),
    }
}

/// Record a funding exchange
#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    /// Gross amount, as a decimal string (negative for withdrawals)
    pub amount: String,
    /// Fee, as a decimal string (defaults to zero)
    #[serde(default)]
    pub fee: Option<String>,
}

/// Exchange response
#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    /// Username
    pub participant: String,
    /// Recorded amount, as a two-decimal string
    pub amount: String,
    /// Recorded fee, as a two-decimal string
    pub fee: String,
    /// New balance, as a two-decimal string
    pub balance: String,
}

/// Record a charge (positive amount) or withdrawal (negative amount)
/// against a participant's balance.
pub async fn record_exchange(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Json(req): Json<ExchangeRequest>,
) -> axum::response::Response {
    info!(
        "API: Exchange request: participant={}, amount={}",
        username, req.amount
    );

    let amount = match money::parse_amount(&req.amount) {
        Ok(a) => a,
        Err(e) => return error_response(e),
    };
    let fee = match req.fee.as_deref() {
        Some(f) => match money::parse_amount(f) {
            Ok(f) => f,
            Err(e) => return error_response(e),
        },
        None => 0,
    };
    if fee < 0 {
        return error_response(PatronageError::Validation(
            "Fees cannot be negative".to_string(),
        ));
    }

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

    match ExchangeQueries::new(&state.app.db)
        .record(participant.id, amount, fee)
        .await
    {
        Ok(balance) => (
            StatusCode::OK,
            Json(ApiResponse::success(ExchangeResponse {
                participant: participant.username,
                amount: money::format_amount(amount),
                fee: money::format_amount(fee),
                balance: money::format_amount(balance),
            })),
        )
            .into_response(),
        Err(e) => error_response(PatronageError::Validation(e.to_string())),
    }
}

/// Toggle a privacy flag
#[derive(Debug, Deserialize)]
pub struct PrivacyRequest {
    /// Name of the flag to flip
    pub toggle: String,
}

/// Privacy toggle response
#[derive(Debug, Serialize)]
pub struct PrivacyResponse {
    /// New state of the anonymous-receiving flag
    pub anonymous_receiving: bool,
}

/// Toggle the caller's anonymous-receiving flag.
///
/// Only the participant themselves may flip it. Once enabled, the
/// receipt chart feed returns 403 to everyone, the participant included.
pub async fn toggle_privacy(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PrivacyRequest>,
) -> axum::response::Response {
    let caller = match forwarded_user(&headers) {
        Some(c) => c,
        None => {
            return error_response(PatronageError::Unauthorized(
                "Privacy changes require a caller identity".to_string(),
            ))
        }
    };

    info!(
        "API: Privacy toggle: participant={}, caller={}, toggle={}",
        username, caller, req.toggle
    );

    if caller != username {
        return error_response(PatronageError::Forbidden(
            "Participants can only change their own privacy settings".to_string(),
        ));
    }

    if req.toggle != "anonymous_receiving" {
        return error_response(PatronageError::Validation(format!(
            "Unknown privacy toggle: {}",
            req.toggle
        )));
    }

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

    match participants.toggle_anonymous_receiving(participant.id).await {
        Ok(state_now) => (
            StatusCode::OK,
            Json(ApiResponse::success(PrivacyResponse {
                anonymous_receiving: state_now,
            })),
        )
            .into_response(),
        Err(e) => error_response(PatronageError::Database(e.to_string())),
    }
}
