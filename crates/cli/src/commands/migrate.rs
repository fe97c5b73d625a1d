//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! atelier-cli migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and are embedded at compile
//! time.

use super::{CliError, connect};

/// Run all pending migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
