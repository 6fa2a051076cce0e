//! CLI command implementations.

pub mod account;
pub mod migrate;
pub mod subscription;

use sqlx::PgPool;
use thiserror::Error;

use listing_portal_server::config::{ConfigError, WorkflowConfig, get_database_url};
use listing_portal_server::db;
use listing_portal_server::services::{ProvisioningError, Services, SubscriptionError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Account not found: {0}")]
    AccountNotFound(String),
}

/// Connect to the portal database.
async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("PORTAL_DATABASE_URL")?;

    tracing::info!("Connecting to portal database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Services backed by the portal database.
async fn services() -> Result<Services, CliError> {
    let pool = connect().await?;
    let workflow = WorkflowConfig::from_env()?;
    Ok(Services::new(&db::postgres_stores(&pool), &workflow))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_display() {
        let err = CliError::AccountNotFound("1234".to_string());
        assert_eq!(err.to_string(), "Account not found: 1234");

        let err = CliError::Config(ConfigError::MissingEnvVar("PORTAL_DATABASE_URL".into()));
        assert!(err.to_string().contains("PORTAL_DATABASE_URL"));
    }
}
