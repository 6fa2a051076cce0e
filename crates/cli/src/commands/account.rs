//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! lp-cli account create -e agent@example.com -p 'password' --first-name Jane --last-name Doe
//! lp-cli account promote 6f1c...
//! ```

use secrecy::SecretString;

use listing_portal_core::{AccountId, AccountMetadata};
use listing_portal_server::services::SignupRequest;

use super::{CliError, connect, services};

/// Provision an account through the signup saga.
///
/// # Errors
///
/// Returns `CliError::Provisioning` if any step fails; partial work has been
/// rolled back and the error reports how the rollback went.
pub async fn create(
    email: String,
    password: String,
    metadata: AccountMetadata,
) -> Result<AccountId, CliError> {
    let services = services().await?;

    let request = SignupRequest {
        email,
        password: SecretString::from(password),
        metadata,
    };
    let account = services.provisioning.provision(request).await?;

    tracing::info!(
        "Account created successfully! ID: {}, Slug: {}, Role: {}",
        account.account_id,
        account.profile.slug,
        account.role
    );
    Ok(account.account_id)
}

/// Grant the super admin role, replacing any existing role.
///
/// # Errors
///
/// Returns `CliError::AccountNotFound` if no identity exists for the id.
pub async fn promote(account_id: AccountId) -> Result<(), CliError> {
    let pool = connect().await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM auth.identity WHERE id = $1)")
            .bind(account_id)
            .fetch_one(&pool)
            .await?;
    if !exists {
        return Err(CliError::AccountNotFound(account_id.to_string()));
    }

    sqlx::query(
        r"
        INSERT INTO portal.role_assignment (account_id, role)
        VALUES ($1, 'super_admin')
        ON CONFLICT (account_id) DO UPDATE SET role = EXCLUDED.role
        ",
    )
    .bind(account_id)
    .execute(&pool)
    .await?;

    tracing::info!("Account {} is now a super admin", account_id);
    Ok(())
}
