//! Database module for patronage
//!
//! This module handles persistent storage for:
//! - Participants and their balances
//! - Pledges (tips) and funding exchanges
//! - Settlement runs (paydays) and the transfers they produce

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

mod models;
mod queries;

pub use models::*;
pub use queries::*;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    /// SQLite connection (wrapped in Arc<Mutex> for thread safety)
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Connect to the database
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to database at {}", database_url);

        // Parse the database URL
        let path = if database_url.starts_with("sqlite:") {
            database_url.strip_prefix("sqlite:").unwrap_or(database_url)
        } else {
            database_url
        };

        // Ensure the directory exists for file-based databases
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Open the connection
        let conn = Connection::open(path)?;

        // Run migrations
        Self::run_migrations(&conn)?;

        info!("Database connected successfully");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
        debug!("Running database migrations...");

        // Participants: account identities with a balance and privacy flags
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS participants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                balance INTEGER NOT NULL DEFAULT 0,
                anonymous_receiving BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL
            )
            "#,
            [],
        )?;

        // Tips are append-only: the current pledge for a (tipper, tippee)
        // pair is the row with the highest id.
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS tips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tipper INTEGER NOT NULL REFERENCES participants(id),
                tippee INTEGER NOT NULL REFERENCES participants(id),
                amount INTEGER NOT NULL,
                mtime DATETIME NOT NULL
            )
            "#,
            [],
        )?;

        // Exchanges: money in (charges) and out (withdrawals)
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS exchanges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                participant INTEGER NOT NULL REFERENCES participants(id),
                amount INTEGER NOT NULL,
                fee INTEGER NOT NULL DEFAULT 0,
                timestamp DATETIME NOT NULL
            )
            "#,
            [],
        )?;

        // Paydays: one row per settlement run; ts_end NULL while open
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS paydays (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts_start DATETIME NOT NULL,
                ts_end DATETIME,
                nparticipants INTEGER NOT NULL DEFAULT 0,
                nactive INTEGER NOT NULL DEFAULT 0,
                transfer_volume INTEGER NOT NULL DEFAULT 0,
                charge_volume INTEGER NOT NULL DEFAULT 0,
                withdrawal_volume INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        // Transfers: one row per movement of funds
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS transfers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tipper INTEGER NOT NULL REFERENCES participants(id),
                tippee INTEGER NOT NULL REFERENCES participants(id),
                amount INTEGER NOT NULL,
                context TEXT NOT NULL DEFAULT 'tip',
                timestamp DATETIME NOT NULL
            )
            "#,
            [],
        )?;

        // Indexes for the hot query paths
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tips_tipper_tippee ON tips(tipper, tippee)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transfers_tippee ON transfers(tippee)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_exchanges_participant ON exchanges(participant)",
            [],
        )?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Get the database connection
    pub fn conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// Close the database connection
    pub async fn close(&self) {
        info!("Closing database connection...");
        // The connection will be closed when the Arc is dropped
        info!("Database connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_connect() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let conn_lock = db.conn();
        let conn = conn_lock.lock().await;
        let count: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
