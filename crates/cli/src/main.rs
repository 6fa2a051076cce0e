//! Listing Portal CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! lp-cli migrate
//!
//! # Provision an account (same saga as the signup endpoint)
//! lp-cli account create -e agent@example.com -p 'password' --first-name Jane --last-name Doe
//!
//! # Grant super admin
//! lp-cli account promote <ACCOUNT_ID>
//!
//! # Review subscription requests
//! lp-cli subscription pending
//! lp-cli subscription approve <REQUEST_ID>
//! lp-cli subscription reject <REQUEST_ID>
//! lp-cli subscription reconcile <REQUEST_ID>
//! ```
//!
//! # Environment Variables
//!
//! - `PORTAL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use listing_portal_core::{AccountId, SubscriptionRequestId};

mod commands;

#[derive(Parser)]
#[command(name = "lp-cli")]
#[command(author, version, about = "Listing Portal CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Review subscription requests
    Subscription {
        #[command(subcommand)]
        action: SubscriptionAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Provision a new agent account
    Create {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        company: Option<String>,
    },
    /// Make an existing account a super admin
    Promote {
        account_id: AccountId,
    },
}

#[derive(Subcommand)]
enum SubscriptionAction {
    /// List pending requests, oldest first
    Pending,
    /// Approve a pending request and upgrade the account
    Approve { request_id: SubscriptionRequestId },
    /// Reject a pending request
    Reject { request_id: SubscriptionRequestId },
    /// Re-apply the profile upgrade of an approved request
    Reconcile { request_id: SubscriptionRequestId },
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
        Commands::Account { action } => match action {
            AccountAction::Create {
                email,
                password,
                first_name,
                last_name,
                phone,
                company,
            } => {
                let metadata = listing_portal_core::AccountMetadata {
                    first_name,
                    last_name,
                    phone,
                    company,
                };
                commands::account::create(email, password, metadata).await?;
            }
            AccountAction::Promote { account_id } => {
                commands::account::promote(account_id).await?;
            }
        },
        Commands::Subscription { action } => match action {
            SubscriptionAction::Pending => commands::subscription::pending().await?,
            SubscriptionAction::Approve { request_id } => {
                commands::subscription::approve(request_id).await?;
            }
            SubscriptionAction::Reject { request_id } => {
                commands::subscription::reject(request_id).await?;
            }
            SubscriptionAction::Reconcile { request_id } => {
                commands::subscription::reconcile(request_id).await?;
            }
        },
    }
    Ok(())
}
