//! Account, token and seller management commands.
//!
//! # Usage
//!
//! ```bash
//! atelier-cli user create -e admin@example.com --staff
//! atelier-cli staff grant -e ops@example.com
//! atelier-cli token issue -e admin@example.com -l laptop
//! atelier-cli token list -e admin@example.com
//! atelier-cli token revoke 12
//! atelier-cli seller set-commission -e studio@example.com -r 7.5
//! ```

use atelier_api::services::AccountService;
use atelier_core::{ApiTokenId, CommissionRate};

use super::{CliError, connect};

async fn accounts() -> Result<AccountService, CliError> {
    Ok(AccountService::new(connect().await?))
}

/// Create an account.
pub async fn create(email: &str, staff: bool) -> Result<(), CliError> {
    let user = accounts().await?.create_user(email, staff).await?;
    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Staff: {}",
        user.id,
        user.email,
        user.is_staff
    );
    Ok(())
}

/// Grant or revoke staff access.
pub async fn set_staff(email: &str, is_staff: bool) -> Result<(), CliError> {
    let accounts = accounts().await?;
    let user = accounts.find_by_email(email).await?;
    accounts.set_staff(user.id, is_staff).await?;
    tracing::info!("Staff access for {} set to {}", user.email, is_staff);
    Ok(())
}

/// Issue a bearer token and print it.
pub async fn issue_token(email: &str, label: &str) -> Result<(), CliError> {
    let accounts = accounts().await?;
    let user = accounts.find_by_email(email).await?;
    let issued = accounts.issue_token(user.id, label).await?;

    tracing::info!("Token {} issued for {}", issued.token.id, user.email);
    tracing::warn!("The token is shown once. Store it now.");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", issued.secret);
    }
    Ok(())
}

/// List a user's tokens.
pub async fn list_tokens(email: &str) -> Result<(), CliError> {
    let accounts = accounts().await?;
    let user = accounts.find_by_email(email).await?;
    let tokens = accounts.list_tokens(user.id).await?;

    #[allow(clippy::print_stdout)]
    for token in tokens {
        let state = token
            .revoked_at
            .map_or_else(|| "active".to_owned(), |at| format!("revoked {at}"));
        println!(
            "{:>6}  {:<20}  created {}  {}",
            token.id, token.label, token.created_at, state
        );
    }
    Ok(())
}

/// Revoke a token.
pub async fn revoke_token(id: i32) -> Result<(), CliError> {
    accounts().await?.revoke_token(ApiTokenId::new(id)).await?;
    tracing::info!("Token {} revoked", id);
    Ok(())
}

/// Set a seller's commission rate, or clear it with `None`.
pub async fn set_commission(email: &str, rate: Option<&str>) -> Result<(), CliError> {
    let rate = rate
        .map(str::parse::<CommissionRate>)
        .transpose()
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    let accounts = accounts().await?;
    let user = accounts.find_by_email(email).await?;
    accounts.set_commission_rate(user.id, rate).await?;

    match rate {
        Some(rate) => tracing::info!("Commission rate for {} set to {}%", user.email, rate),
        None => tracing::info!("Commission rate for {} cleared", user.email),
    }
    Ok(())
}
