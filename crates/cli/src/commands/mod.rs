//! CLI command implementations.

pub mod audit;
pub mod migrate;
pub mod users;

use sqlx::PgPool;
use thiserror::Error;

use atelier_api::config::{ApiConfig, ConfigError};
use atelier_api::db;
use atelier_api::services::ServiceError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The requested operation was rejected.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// A command-line argument could not be parsed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// At least one wallet balance disagrees with its ledger.
    #[error("{0} wallet(s) failed the ledger audit")]
    LedgerMismatch(usize),
}

/// Connect to the database named by the environment.
pub async fn connect() -> Result<PgPool, CliError> {
    let config = ApiConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&config.database_url).await?)
}
