//! Atelier CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! atelier-cli migrate
//!
//! # Create a staff account and give it a token
//! atelier-cli user create -e admin@example.com --staff
//! atelier-cli token issue -e admin@example.com -l laptop
//!
//! # Set a seller's commission rate (or --clear to use the default)
//! atelier-cli seller set-commission -e studio@example.com -r 7.5
//!
//! # Check every wallet balance against its ledger
//! atelier-cli audit wallets
//! ```
//!
//! # Environment Variables
//!
//! - `ATELIER_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "atelier-cli")]
#[command(author, version, about = "Atelier CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Grant or revoke staff access
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Seller settings
    Seller {
        #[command(subcommand)]
        action: SellerAction,
    },
    /// Ledger consistency checks
    Audit {
        #[command(subcommand)]
        target: AuditTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Grant staff access
        #[arg(long)]
        staff: bool,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Grant staff access
    Grant {
        #[arg(short, long)]
        email: String,
    },
    /// Revoke staff access
    Revoke {
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a bearer token (printed once)
    Issue {
        #[arg(short, long)]
        email: String,

        /// Label to tell tokens apart
        #[arg(short, long, default_value = "cli")]
        label: String,
    },
    /// List a user's tokens
    List {
        #[arg(short, long)]
        email: String,
    },
    /// Revoke a token by ID
    Revoke {
        /// Token ID
        id: i32,
    },
}

#[derive(Subcommand)]
enum SellerAction {
    /// Set or clear a seller's commission rate
    SetCommission {
        #[arg(short, long)]
        email: String,

        /// Percentage between 0 and 100
        #[arg(short, long, conflicts_with = "clear", required_unless_present = "clear")]
        rate: Option<String>,

        /// Remove the seller's rate so the default applies
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum AuditTarget {
    /// Recompute every wallet balance from its transactions
    Wallets,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create { email, staff } => {
                commands::users::create(&email, staff).await?;
            }
        },
        Commands::Staff { action } => match action {
            StaffAction::Grant { email } => commands::users::set_staff(&email, true).await?,
            StaffAction::Revoke { email } => commands::users::set_staff(&email, false).await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Issue { email, label } => {
                commands::users::issue_token(&email, &label).await?;
            }
            TokenAction::List { email } => commands::users::list_tokens(&email).await?,
            TokenAction::Revoke { id } => commands::users::revoke_token(id).await?,
        },
        Commands::Seller { action } => match action {
            SellerAction::SetCommission { email, rate, clear } => {
                let rate = if clear { None } else { rate };
                commands::users::set_commission(&email, rate.as_deref()).await?;
            }
        },
        Commands::Audit { target } => match target {
            AuditTarget::Wallets => commands::audit::wallets().await?,
        },
    }
    Ok(())
}
