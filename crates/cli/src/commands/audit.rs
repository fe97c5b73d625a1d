//! Ledger audit command.
//!
//! # Usage
//!
//! ```bash
//! atelier-cli audit wallets
//! ```
//!
//! Exits non-zero when any wallet's stored balance differs from the signed
//! sum of its transactions.

use atelier_api::services::{NotificationDispatcher, WalletService};

use super::{CliError, connect};

/// Audit every wallet.
pub async fn wallets() -> Result<(), CliError> {
    let pool = connect().await?;
    let service = WalletService::new(pool.clone(), NotificationDispatcher::new(pool));
    let audits = service.audit_all().await?;

    #[allow(clippy::print_stdout)]
    for audit in &audits {
        println!(
            "{:>6}  {:<10}  stored {:>12}  ledger {:>12}  entries {:>5}  {}",
            audit.wallet_id,
            audit.owner.to_string(),
            audit.stored_balance.to_string(),
            audit.ledger_balance.to_string(),
            audit.entries,
            if audit.is_consistent() { "ok" } else { "MISMATCH" }
        );
    }

    let mismatched = audits.iter().filter(|a| !a.is_consistent()).count();
    if mismatched > 0 {
        return Err(CliError::LedgerMismatch(mismatched));
    }
    tracing::info!("All {} wallets consistent", audits.len());
    Ok(())
}
