//! Configuration management for patronage
//!
//! Configuration is loaded from TOML files and environment variables.
//!
//! # Example Configuration File
//!
//! ```toml
//! [service]
//! name = "patronage"
//! data_dir = "/var/lib/patronage"
//!
//! [payday]
//! min_tip = "0.00"
//! max_tip = "100.00"
//!
//! [api]
//! bind_address = "0.0.0.0:8080"
//!
//! [database]
//! url = "sqlite:patronage.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::money;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service identity configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Payday (settlement run) configuration
    #[serde(default)]
    pub payday: PaydayConfig,

    /// API server configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            payday: PaydayConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Service identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Instance name (shows up in the health endpoint)
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Data directory for storing service state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_service_name() -> String {
    "patronage".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("patronage"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Payday (settlement run) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaydayConfig {
    /// Minimum pledge amount, as a decimal string
    #[serde(default = "default_min_tip")]
    pub min_tip: String,

    /// Maximum pledge amount per recipient, as a decimal string
    #[serde(default = "default_max_tip")]
    pub max_tip: String,
}

impl Default for PaydayConfig {
    fn default() -> Self {
        Self {
            min_tip: default_min_tip(),
            max_tip: default_max_tip(),
        }
    }
}

fn default_min_tip() -> String {
    "0.00".to_string()
}

fn default_max_tip() -> String {
    "100.00".to_string()
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the API server to
    #[serde(default = "default_api_bind")]
    pub bind_address: String,

    /// API request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_api_bind(),
            timeout_seconds: default_api_timeout(),
            enable_cors: true,
        }
    }
}

fn default_api_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL or path
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:patronage.db".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Resolve the database URL, making it relative to data_dir if needed
    pub fn resolve_database_url(&self) -> String {
        let url = &self.database.url;

        // If it's already an absolute path or :memory:, use as-is
        if url.starts_with("sqlite:/") || url == "sqlite::memory:" {
            return url.clone();
        }

        // Extract the path part
        let path = if url.starts_with("sqlite:") {
            url.strip_prefix("sqlite:").unwrap_or(url)
        } else {
            url
        };

        // If it's already absolute, use as-is
        if std::path::Path::new(path).is_absolute() {
            return url.clone();
        }

        // Make it relative to data_dir
        let db_path = self.service.data_dir.join(path);
        format!("sqlite:{}", db_path.display())
    }

    /// Get the API bind address
    pub fn api_bind_address(&self) -> String {
        self.api.bind_address.clone()
    }

    /// Minimum pledge amount in cents
    pub fn min_tip_cents(&self) -> money::Cents {
        money::parse_amount(&self.payday.min_tip).unwrap_or(0)
    }

    /// Maximum pledge amount in cents
    pub fn max_tip_cents(&self) -> money::Cents {
        money::parse_amount(&self.payday.max_tip).unwrap_or(10_000)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        // Validate pledge limits
        let min_tip = money::parse_amount(&self.payday.min_tip)
            .map_err(|e| format!("Invalid payday.min_tip: {}", e))?;
        let max_tip = money::parse_amount(&self.payday.max_tip)
            .map_err(|e| format!("Invalid payday.max_tip: {}", e))?;

        if min_tip < 0 {
            return Err("Minimum pledge amount cannot be negative".to_string());
        }

        if max_tip <= 0 {
            return Err("Maximum pledge amount must be positive".to_string());
        }

        if min_tip >= max_tip {
            return Err(
                "Minimum pledge amount must be less than maximum pledge amount".to_string(),
            );
        }

        // Validate bind address
        if self.api.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid api.bind_address: {}",
                self.api.bind_address
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tip_limits() {
        let config = Config::default();
        assert_eq!(config.min_tip_cents(), 0);
        assert_eq!(config.max_tip_cents(), 10_000);
    }

    #[test]
    fn test_validate_config() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        // Invalid: min >= max
        config.payday.min_tip = "100.00".to_string();
        assert!(config.validate().is_err());

        // Reset and test invalid bind address
        config.payday.min_tip = "0.00".to_string();
        config.api.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_database_url() {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        assert_eq!(config.resolve_database_url(), "sqlite::memory:");

        config.database.url = "sqlite:patronage.db".to_string();
        config.service.data_dir = PathBuf::from("/tmp/patronage");
        assert_eq!(
            config.resolve_database_url(),
            "sqlite:/tmp/patronage/patronage.db"
        );
    }
}
