//! Patronage: a settlement service for a recurring-donation platform
//!
//! Patrons pledge a recurring per-period amount ("tip") to recipients.
//! An explicitly invoked batch run ("payday") settles the current
//! pledges: it moves money from patron balances to recipient balances
//! and records one transfer per funded pledge, closing with per-run
//! aggregate statistics. Two JSON chart feeds expose the results:
//!
//! - **Per-recipient history**: `GET /:username/charts.json`, one entry
//!   per settlement run since the recipient first received funds
//! - **Site-wide volume**: `GET /about/charts.json`, one entry per run
//!   with transfer/charge/withdrawal volumes and user counts
//!
//! # Architecture
//!
//! 1. An axum HTTP API receives pledges, funding exchanges, and the
//!    payday trigger, and serves the chart feeds
//! 2. SQLite holds participants, tips, exchanges, paydays, and transfers
//! 3. The payday service runs each settlement atomically in a single
//!    database transaction
//!
//! Authentication lives in a fronting proxy: the service trusts the
//! `X-Forwarded-User` header for caller identity.
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod db;
pub mod money;
pub mod payday;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub use config::Config;
use db::Database;
use payday::PaydayService;

/// The main application state
#[derive(Clone)]
pub struct App {
    /// Application configuration
    pub config: Arc<Config>,
    /// Database connection
    pub db: Arc<Database>,
    /// Settlement run service
    pub payday: Arc<PaydayService>,
}

impl App {
    /// Create a new application instance
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing patronage application...");

        let config = Arc::new(config);

        // Initialize the database
        let db_url = config.resolve_database_url();
        info!("Connecting to database at: {}", db_url);
        let db = Database::connect(&db_url).await?;
        let db = Arc::new(db);
        info!("Database connected successfully");

        // Create the payday service
        let payday = Arc::new(PaydayService::new(config.clone(), db.clone()));

        info!("Patronage application initialized successfully");

        Ok(Self { config, db, payday })
    }

    /// Start the application
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(tokio::sync::oneshot::channel().1)
            .await
    }

    /// Start the application with shutdown signal
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        info!("Starting patronage application...");

        // Start the HTTP API server with shutdown handler
        let api_handle = tokio::spawn({
            let app = self.clone();
            async move {
                if let Err(e) = api::serve_with_shutdown(app, shutdown_rx).await {
                    tracing::warn!("API server error: {}", e);
                }
            }
        });

        info!(
            "Patronage application running. API available at http://{}",
            self.config.api_bind_address()
        );

        // Wait for the API server
        api_handle.await?;

        Ok(())
    }

    /// Shutdown the application gracefully
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down patronage application...");

        self.db.close().await;

        info!("Patronage application shutdown complete");
        Ok(())
    }
}

/// Error types for the application
#[derive(thiserror::Error, Debug)]
pub enum PatronageError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to see or do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No caller identity was provided
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Settlement run error
    #[error("Payday error: {0}")]
    Payday(String),

    /// API error
    #[error("API error: {0}")]
    Api(String),
}

impl From<rusqlite::Error> for PatronageError {
    fn from(e: rusqlite::Error) -> Self {
        PatronageError::Database(e.to_string())
    }
}

/// Result type alias for application operations
pub type PatronageResult<T> = std::result::Result<T, PatronageError>;
