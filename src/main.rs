use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};

use patronage::{config::Config, App};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .init();

    info!("Starting patronage...");

    // Load configuration
    let config = load_config().await?;

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    // Create and run the application
    let app = App::new(config).await?;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // Handle shutdown signals
    let app_clone = app.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, initiating graceful shutdown...");
                let _ = shutdown_tx.send(());
                if let Err(e) = app_clone.shutdown().await {
                    error!("Error during shutdown: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        }
    });

    // Run the application with shutdown handler
    app.run_with_shutdown(shutdown_rx).await?;

    info!("Patronage server stopped gracefully");
    Ok(())
}

/// Load configuration from file or use defaults
async fn load_config() -> Result<Config> {
    // Look for config in standard locations
    let config_paths = vec![
        PathBuf::from("./patronage.toml"),
        PathBuf::from("/etc/patronage/patronage.toml"),
        dirs::config_dir()
            .map(|d| d.join("patronage/patronage.toml"))
            .unwrap_or_default(),
    ];

    for path in config_paths {
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            let content = tokio::fs::read_to_string(&path).await?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(Config::default())
}
