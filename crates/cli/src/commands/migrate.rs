//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! lp-cli migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/`:
//!
//! ```text
//! migrations/
//! ├── 20250301000001_create_identities.sql
//! ├── 20250301000002_create_profiles_and_roles.sql
//! ├── 20250301000003_create_subscription_requests.sql
//! └── 20250301000004_create_listings.sql
//! ```

use super::{CliError, connect};

/// Run portal database migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running portal migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Portal migrations complete!");
    Ok(())
}
