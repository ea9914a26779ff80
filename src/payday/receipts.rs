//! Chart aggregation over settlement runs
//!
//! Both chart feeds are computed at query time from closed runs and
//! transfer rows. Attribution is by timestamp window: run i owns every
//! transfer timestamped in `[ts_start_i, ts_start_i+1)`, and the latest
//! run's window stays open until a newer run starts. An out-of-band
//! transfer inserted between runs therefore lands in the run that was
//! current when it was recorded. Patron counts are transfer-row counts,
//! so a patron appearing twice in one window is counted twice.

use crate::db::{PaydayModel, TransferModel};
use crate::money::Cents;
use chrono::{DateTime, Utc};

/// One entry of a recipient's donation history
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptEntry {
    /// Start time of the run this entry belongs to
    pub ts_start: DateTime<Utc>,
    /// Number of transfers received during the run
    pub npatrons: i64,
    /// Total amount received during the run, in cents
    pub receipts: Cents,
}

/// One entry of the site-wide transfer-volume series
#[derive(Debug, Clone, PartialEq)]
pub struct SiteChartRow {
    /// Start time of the run
    pub ts_start: DateTime<Utc>,
    /// Pledge-driven transfer volume for the run, in cents
    pub transfer_volume: Cents,
    /// Funds drawn from external sources during the run, in cents
    pub charge_volume: Cents,
    /// Funds paid out externally during the run, in cents
    pub withdrawal_volume: Cents,
    /// Participants active during the run
    pub nactive: i64,
    /// Total accounts at the run's close
    pub nparticipants: i64,
    /// Lifetime transfer volume through this run, in cents
    pub cumulative_volume: Cents,
}

/// Build a recipient's donation history, most recent run first.
///
/// `paydays` must be the closed runs in ascending order; `transfers` the
/// recipient's incoming rows. The history starts at the first run with
/// any receipts and continues through every later run, zero entries
/// included. A recipient whose pledges were never funded gets an empty
/// history, not a row of zeroes per run.
pub fn receipt_history(
    paydays: &[PaydayModel],
    transfers: &[TransferModel],
) -> Vec<ReceiptEntry> {
    let mut entries: Vec<ReceiptEntry> = Vec::with_capacity(paydays.len());

    for (i, payday) in paydays.iter().enumerate() {
        let window_end = paydays.get(i + 1).map(|next| next.ts_start);

        let mut npatrons = 0;
        let mut receipts = 0;
        for transfer in transfers {
            if transfer.timestamp < payday.ts_start {
                continue;
            }
            if let Some(end) = window_end {
                if transfer.timestamp >= end {
                    continue;
                }
            }
            npatrons += 1;
            receipts += transfer.amount;
        }

        entries.push(ReceiptEntry {
            ts_start: payday.ts_start,
            npatrons,
            receipts,
        });
    }

    // Trim the leading runs before the first receipt ever arrived.
    let first = entries.iter().position(|e| e.npatrons > 0 || e.receipts > 0);
    match first {
        Some(idx) => {
            let mut history = entries.split_off(idx);
            history.reverse();
            history
        }
        None => Vec::new(),
    }
}

/// Build the site-wide per-run series, most recent run first.
///
/// `paydays` must be the closed runs in ascending order. The cumulative
/// volume is a running total of each run's stored transfer volume.
pub fn site_history(paydays: &[PaydayModel]) -> Vec<SiteChartRow> {
    let mut cumulative = 0;
    let mut rows: Vec<SiteChartRow> = paydays
        .iter()
        .map(|p| {
            cumulative += p.transfer_volume;
            SiteChartRow {
                ts_start: p.ts_start,
                transfer_volume: p.transfer_volume,
                charge_volume: p.charge_volume,
                withdrawal_volume: p.withdrawal_volume,
                nactive: p.nactive,
                nparticipants: p.nparticipants,
                cumulative_volume: cumulative,
            }
        })
        .collect();
    rows.reverse();
    rows
}
