//! Payday: the settlement batch
//!
//! A payday is an explicitly invoked, sequentially numbered settlement
//! run. It moves money from patron balances to recipient balances
//! according to the current pledges, records one transfer row per funded
//! pledge, and closes with per-run aggregate statistics.
//!
//! The whole run executes inside a single SQLite transaction: queries
//! never observe a half-finished run, and the connection mutex
//! serializes concurrent invocations.

use crate::{
    config::Config,
    db::Database,
    money::{self, Cents},
    PatronageError, PatronageResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub mod receipts;

/// The settlement run service
pub struct PaydayService {
    /// Configuration
    config: Arc<Config>,
    /// Database connection
    db: Arc<Database>,
}

/// Summary of a completed settlement run
#[derive(Debug, Clone, Serialize)]
pub struct PaydayReport {
    /// Run ID
    pub payday_id: i64,
    /// Number of transfers performed
    pub ntransfers: i64,
    /// Sum of performed transfers, as a two-decimal string
    pub transfer_volume: String,
    /// Number of pledges skipped for insufficient balance
    pub nskipped: i64,
    /// Distinct participants on either side of a transfer
    pub nactive: i64,
    /// Total number of accounts at close
    pub nparticipants: i64,
}

/// A pledge due for settlement: the latest nonzero tip per pair
struct DuePledge {
    tipper: i64,
    tippee: i64,
    amount: Cents,
}

/// Outcome of the pledge-settlement stage
struct SettleOutcome {
    ntransfers: i64,
    nskipped: i64,
    transfer_volume: Cents,
    active: HashSet<i64>,
}

impl PaydayService {
    /// Create a new payday service
    pub fn new(config: Arc<Config>, db: Arc<Database>) -> Self {
        Self { config, db }
    }

    /// Execute one settlement run.
    ///
    /// If an unfinished run exists (a prior invocation crashed before
    /// committing), its row is resumed instead of starting a second one,
    /// so re-running is idempotent.
    pub async fn run(&self) -> PatronageResult<PaydayReport> {
        let conn = self.db.conn();
        let mut conn = conn.lock().await;
        let tx = conn.transaction().map_err(PatronageError::from)?;

        let (payday_id, ts_start) = Self::open_run(&tx)?;
        info!("Payday {} started (ts_start={})", payday_id, ts_start);

        let outcome = Self::settle_pledges(&tx, self.config.max_tip_cents())?;
        info!(
            "Payday {}: {} transfers, {} skipped, volume={} cents",
            payday_id, outcome.ntransfers, outcome.nskipped, outcome.transfer_volume
        );

        let report = Self::close_run(&tx, payday_id, ts_start, &outcome)?;

        tx.commit().map_err(PatronageError::from)?;
        info!(
            "Payday {} closed: volume={}, active={}, participants={}",
            report.payday_id, report.transfer_volume, report.nactive, report.nparticipants
        );

        Ok(report)
    }

    /// Find the open run, or start a new one
    fn open_run(conn: &Connection) -> PatronageResult<(i64, DateTime<Utc>)> {
        let existing: Option<(i64, DateTime<Utc>)> = conn
            .query_row(
                "SELECT id, ts_start FROM paydays WHERE ts_end IS NULL ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((id, ts_start)) = existing {
            info!("Resuming unfinished payday {}", id);
            return Ok((id, ts_start));
        }

        let ts_start = Utc::now();
        conn.execute(
            "INSERT INTO paydays (ts_start) VALUES (?1)",
            rusqlite::params![ts_start],
        )?;
        Ok((conn.last_insert_rowid(), ts_start))
    }

    /// Settle every current pledge.
    ///
    /// A pledge is funded in full or skipped: if the patron's balance
    /// does not cover the whole amount, no partial transfer happens.
    /// Pledges above the configured maximum are skipped too; they can
    /// exist if the limit was lowered after they were recorded.
    fn settle_pledges(conn: &Connection, max_tip: Cents) -> PatronageResult<SettleOutcome> {
        let pledges = Self::due_pledges(conn)?;
        debug!("{} pledges due for settlement", pledges.len());

        let mut outcome = SettleOutcome {
            ntransfers: 0,
            nskipped: 0,
            transfer_volume: 0,
            active: HashSet::new(),
        };

        for pledge in pledges {
            if pledge.amount > max_tip {
                debug!(
                    "Skipping pledge tipper={} tippee={} amount={}: above the pledge limit",
                    pledge.tipper, pledge.tippee, pledge.amount
                );
                outcome.nskipped += 1;
                continue;
            }

            let debited = conn.execute(
                "UPDATE participants SET balance = balance - ?1 WHERE id = ?2 AND balance >= ?1",
                rusqlite::params![pledge.amount, pledge.tipper],
            )?;
            if debited == 0 {
                debug!(
                    "Skipping pledge tipper={} tippee={} amount={}: insufficient balance",
                    pledge.tipper, pledge.tippee, pledge.amount
                );
                outcome.nskipped += 1;
                continue;
            }

            conn.execute(
                "UPDATE participants SET balance = balance + ?1 WHERE id = ?2",
                rusqlite::params![pledge.amount, pledge.tippee],
            )?;

            conn.execute(
                "INSERT INTO transfers (tipper, tippee, amount, context, timestamp) VALUES (?1, ?2, ?3, 'tip', ?4)",
                rusqlite::params![pledge.tipper, pledge.tippee, pledge.amount, Utc::now()],
            )?;

            outcome.ntransfers += 1;
            outcome.transfer_volume += pledge.amount;
            outcome.active.insert(pledge.tipper);
            outcome.active.insert(pledge.tippee);
        }

        Ok(outcome)
    }

    /// The latest nonzero pledge per (tipper, tippee) pair, in tip-id order
    fn due_pledges(conn: &Connection) -> PatronageResult<Vec<DuePledge>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT t.tipper, t.tippee, t.amount
            FROM tips t
            JOIN (
                SELECT tipper, tippee, MAX(id) AS id
                FROM tips
                GROUP BY tipper, tippee
            ) cur ON cur.id = t.id
            WHERE t.amount > 0
            ORDER BY t.id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DuePledge {
                tipper: row.get(0)?,
                tippee: row.get(1)?,
                amount: row.get(2)?,
            })
        })?;

        let mut pledges = Vec::new();
        for row in rows {
            pledges.push(row?);
        }
        Ok(pledges)
    }

    /// Compute the run's aggregate statistics and close it
    fn close_run(
        conn: &Connection,
        payday_id: i64,
        ts_start: DateTime<Utc>,
        outcome: &SettleOutcome,
    ) -> PatronageResult<PaydayReport> {
        let nparticipants: i64 =
            conn.query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?;

        // Charges and withdrawals recorded while the run was open. Window
        // comparison happens on parsed timestamps, not SQL text.
        let ts_end = Utc::now();
        let mut charge_volume: Cents = 0;
        let mut withdrawal_volume: Cents = 0;
        {
            let mut stmt = conn.prepare("SELECT amount, timestamp FROM exchanges")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, Cents>(0)?, row.get::<_, DateTime<Utc>>(1)?))
            })?;
            for row in rows {
                let (amount, timestamp) = row?;
                if timestamp < ts_start || timestamp > ts_end {
                    continue;
                }
                if amount > 0 {
                    charge_volume += amount;
                } else {
                    withdrawal_volume += -amount;
                }
            }
        }

        conn.execute(
            r#"
            UPDATE paydays
            SET ts_end = ?1, nparticipants = ?2, nactive = ?3,
                transfer_volume = ?4, charge_volume = ?5, withdrawal_volume = ?6
            WHERE id = ?7
            "#,
            rusqlite::params![
                ts_end,
                nparticipants,
                outcome.active.len() as i64,
                outcome.transfer_volume,
                charge_volume,
                withdrawal_volume,
                payday_id
            ],
        )?;

        Ok(PaydayReport {
            payday_id,
            ntransfers: outcome.ntransfers,
            transfer_volume: money::format_amount(outcome.transfer_volume),
            nskipped: outcome.nskipped,
            nactive: outcome.active.len() as i64,
            nparticipants,
        })
    }
}
