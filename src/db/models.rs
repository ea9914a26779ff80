//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Cents;

/// Participant database model
///
/// A participant is both a potential patron (giver) and recipient
/// (receiver); the distinction only exists per pledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantModel {
    /// Participant ID
    pub id: i64,
    /// Unique username
    pub username: String,
    /// Current balance in cents
    pub balance: Cents,
    /// Whether the participant's receiving history is hidden from everyone
    pub anonymous_receiving: bool,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

/// Tip (pledge) database model
///
/// Tips are append-only: the current pledge for a (tipper, tippee) pair
/// is the most recently recorded row, and an amount of zero cancels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipModel {
    /// Tip ID
    pub id: i64,
    /// Pledging participant ID
    pub tipper: i64,
    /// Receiving participant ID
    pub tippee: i64,
    /// Pledged amount per settlement run, in cents
    pub amount: Cents,
    /// Time the pledge was recorded
    pub mtime: DateTime<Utc>,
}

/// Payday (settlement run) database model
///
/// One row per run. `ts_end` is NULL while the run is open; the stats
/// columns are written when the run closes and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaydayModel {
    /// Run ID
    pub id: i64,
    /// Run start time
    pub ts_start: DateTime<Utc>,
    /// Run end time (None while the run is open)
    pub ts_end: Option<DateTime<Utc>>,
    /// Total number of accounts at close
    pub nparticipants: i64,
    /// Distinct participants on either side of this run's transfers
    pub nactive: i64,
    /// Sum of this run's transfers, in cents
    pub transfer_volume: Cents,
    /// Sum of charges recorded during the run, in cents
    pub charge_volume: Cents,
    /// Sum of withdrawals recorded during the run, in cents (positive)
    pub withdrawal_volume: Cents,
}

/// Transfer database model
///
/// One row per movement of funds from a patron to a recipient. Transfers
/// carry no run ID: attribution to a run happens by timestamp window, so
/// out-of-band rows inserted between runs attach to the run that was
/// current when they were recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferModel {
    /// Transfer ID
    pub id: i64,
    /// Paying participant ID
    pub tipper: i64,
    /// Receiving participant ID
    pub tippee: i64,
    /// Amount in cents
    pub amount: Cents,
    /// Transfer context (e.g. "tip")
    pub context: String,
    /// Time the transfer was recorded
    pub timestamp: DateTime<Utc>,
}
