//! Database queries

use super::{Database, ParticipantModel, PaydayModel, TipModel, TransferModel};
use crate::money::Cents;
use anyhow::Result;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::info;

/// Participant queries
pub struct ParticipantQueries<'a> {
    db: &'a Database,
}

impl<'a> ParticipantQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a participant with a zero balance
    pub async fn create(&self, username: &str) -> Result<ParticipantModel> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO participants (username, balance, anonymous_receiving, created_at) VALUES (?1, 0, 0, ?2)",
            rusqlite::params![username, created_at],
        )?;
        let id = conn.last_insert_rowid();

        info!("DB: Created participant: id={}, username={}", id, username);

        Ok(ParticipantModel {
            id,
            username: username.to_string(),
            balance: 0,
            anonymous_receiving: false,
            created_at,
        })
    }

    /// Look up a participant by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<ParticipantModel>> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, username, balance, anonymous_receiving, created_at FROM participants WHERE username = ?1"
        )?;

        let result = stmt
            .query_row(rusqlite::params![username], |row| {
                Ok(ParticipantModel {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    balance: row.get(2)?,
                    anonymous_receiving: row.get::<_, i32>(3)? != 0,
                    created_at: row.get(4)?,
                })
            })
            .optional()?;

        Ok(result)
    }

    /// Total number of accounts
    pub async fn count(&self) -> Result<i64> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Adjust a participant's balance by a delta (positive or negative).
    ///
    /// No overdraw check: this is the raw primitive used by administrative
    /// corrections and out-of-band transfers.
    pub async fn adjust_balance(&self, id: i64, delta: Cents) -> Result<()> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        conn.execute(
            "UPDATE participants SET balance = balance + ?1 WHERE id = ?2",
            rusqlite::params![delta, id],
        )?;
        Ok(())
    }

    /// Flip the anonymous-receiving flag, returning the new state
    pub async fn toggle_anonymous_receiving(&self, id: i64) -> Result<bool> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        conn.execute(
            "UPDATE participants SET anonymous_receiving = NOT anonymous_receiving WHERE id = ?1",
            rusqlite::params![id],
        )?;
        let state: bool = conn.query_row(
            "SELECT anonymous_receiving FROM participants WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok(row.get::<_, i32>(0)? != 0),
        )?;

        info!("DB: Toggled anonymous_receiving: id={}, now={}", id, state);

        Ok(state)
    }
}

/// Tip (pledge) queries
pub struct TipQueries<'a> {
    db: &'a Database,
}

impl<'a> TipQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a pledge, superseding any prior pledge for the pair.
    ///
    /// Tips are append-only; an amount of zero cancels the pledge.
    pub async fn set(&self, tipper: i64, tippee: i64, amount: Cents) -> Result<TipModel> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let mtime = Utc::now();
        conn.execute(
            "INSERT INTO tips (tipper, tippee, amount, mtime) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![tipper, tippee, amount, mtime],
        )?;
        let id = conn.last_insert_rowid();

        info!(
            "DB: Recorded tip: tipper={}, tippee={}, amount={} cents",
            tipper, tippee, amount
        );

        Ok(TipModel {
            id,
            tipper,
            tippee,
            amount,
            mtime,
        })
    }

    /// Current pledge amount for a (tipper, tippee) pair, if any
    pub async fn current_amount(&self, tipper: i64, tippee: i64) -> Result<Option<Cents>> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let result = conn
            .query_row(
                "SELECT amount FROM tips WHERE tipper = ?1 AND tippee = ?2 ORDER BY id DESC LIMIT 1",
                rusqlite::params![tipper, tippee],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }
}

/// Exchange (funding) queries
pub struct ExchangeQueries<'a> {
    db: &'a Database,
}

impl<'a> ExchangeQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record an exchange and apply it to the participant's balance.
    ///
    /// Positive amounts are charges (funds in), negative amounts are
    /// withdrawals. The balance is credited with amount minus fee; a
    /// withdrawal that would overdraw the balance is rejected. Returns
    /// the new balance.
    pub async fn record(&self, participant: i64, amount: Cents, fee: Cents) -> Result<Cents> {
        let conn = self.db.conn().clone();
        let mut conn = conn.lock().await;
        let tx = conn.transaction()?;

        let net = amount - fee;
        let updated = tx.execute(
            "UPDATE participants SET balance = balance + ?1 WHERE id = ?2 AND balance + ?1 >= 0",
            rusqlite::params![net, participant],
        )?;
        if updated == 0 {
            anyhow::bail!("exchange would overdraw the balance");
        }

        let timestamp = Utc::now();
        tx.execute(
            "INSERT INTO exchanges (participant, amount, fee, timestamp) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![participant, amount, fee, timestamp],
        )?;

        let balance: Cents = tx.query_row(
            "SELECT balance FROM participants WHERE id = ?1",
            rusqlite::params![participant],
            |row| row.get(0),
        )?;
        tx.commit()?;

        info!(
            "DB: Recorded exchange: participant={}, amount={} cents, fee={} cents, balance={} cents",
            participant, amount, fee, balance
        );

        Ok(balance)
    }
}

/// Transfer queries
pub struct TransferQueries<'a> {
    db: &'a Database,
}

impl<'a> TransferQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a transfer outside of a settlement run.
    ///
    /// Balances are NOT touched here; out-of-band transfers pair this
    /// with explicit balance adjustments.
    pub async fn record(
        &self,
        tipper: i64,
        tippee: i64,
        amount: Cents,
        context: &str,
    ) -> Result<TransferModel> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let timestamp = Utc::now();
        conn.execute(
            "INSERT INTO transfers (tipper, tippee, amount, context, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![tipper, tippee, amount, context, timestamp],
        )?;
        let id = conn.last_insert_rowid();

        info!(
            "DB: Recorded transfer: tipper={}, tippee={}, amount={} cents, context={}",
            tipper, tippee, amount, context
        );

        Ok(TransferModel {
            id,
            tipper,
            tippee,
            amount,
            context: context.to_string(),
            timestamp,
        })
    }

    /// All transfers received by a participant, oldest first
    pub async fn list_for_tippee(&self, tippee: i64) -> Result<Vec<TransferModel>> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, tipper, tippee, amount, context, timestamp FROM transfers WHERE tippee = ?1 ORDER BY id"
        )?;

        let results = stmt.query_map(rusqlite::params![tippee], |row| {
            Ok(TransferModel {
                id: row.get(0)?,
                tipper: row.get(1)?,
                tippee: row.get(2)?,
                amount: row.get(3)?,
                context: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })?;

        let mut transfers = Vec::new();
        for result in results {
            transfers.push(result?);
        }

        Ok(transfers)
    }
}

/// Payday (settlement run) queries
pub struct PaydayQueries<'a> {
    db: &'a Database,
}

impl<'a> PaydayQueries<'a> {
    /// Create a new query instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// All closed runs, oldest first.
    ///
    /// An open run (ts_end NULL) is never returned: its results are not
    /// visible until it commits.
    pub async fn list_closed(&self) -> Result<Vec<PaydayModel>> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, ts_start, ts_end, nparticipants, nactive, transfer_volume, charge_volume, withdrawal_volume FROM paydays WHERE ts_end IS NOT NULL ORDER BY id"
        )?;

        let results = stmt.query_map([], |row| {
            Ok(PaydayModel {
                id: row.get(0)?,
                ts_start: row.get(1)?,
                ts_end: row.get(2)?,
                nparticipants: row.get(3)?,
                nactive: row.get(4)?,
                transfer_volume: row.get(5)?,
                charge_volume: row.get(6)?,
                withdrawal_volume: row.get(7)?,
            })
        })?;

        let mut paydays = Vec::new();
        for result in results {
            paydays.push(result?);
        }

        Ok(paydays)
    }

    /// Number of runs, open or closed
    pub async fn count(&self) -> Result<i64> {
        let conn = self.db.conn().clone();
        let conn = conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM paydays", [], |row| row.get(0))?;
        Ok(count)
    }
}
