//! `PostgreSQL` adapters for the portal stores.
//!
//! # Schemas
//!
//! - `auth.identity` - Credential store (email, argon2 hash, signup metadata)
//! - `portal.profile` - One profile per account (slug, plan tier, quota)
//! - `portal.role_assignment` - One role per account
//! - `portal.subscription_request` - Upgrade requests and their lifecycle
//! - `portal.listing` - Listings, read here only for quota counting
//!
//! The stores share a database but never a transaction: each adapter
//! implements one of the store traits from `listing_portal_core::stores`
//! and the services coordinate them.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p listing-portal-cli -- migrate
//! ```

pub mod identities;
pub mod listings;
pub mod profiles;
pub mod roles;
pub mod subscription_requests;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use listing_portal_core::StoreError;

pub use identities::PgCredentialStore;
pub use listings::PgListingStore;
pub use profiles::PgProfileStore;
pub use roles::PgRoleStore;
pub use subscription_requests::PgSubscriptionRequestStore;

use crate::services::Stores;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Classify a write error, turning unique violations into `Conflict`.
    pub(crate) fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Self::Conflict(conflict.to_owned())
            }
            other => Self::Database(other),
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::DataCorruption(msg) => Self::DataCorruption(msg),
            RepositoryError::Database(e) => Self::Unavailable(e.to_string()),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Every store backed by the same pool.
#[must_use]
pub fn postgres_stores(pool: &PgPool) -> Stores {
    Stores {
        credentials: Arc::new(PgCredentialStore::new(pool.clone())),
        profiles: Arc::new(PgProfileStore::new(pool.clone())),
        roles: Arc::new(PgRoleStore::new(pool.clone())),
        requests: Arc::new(PgSubscriptionRequestStore::new(pool.clone())),
        listings: Arc::new(PgListingStore::new(pool.clone())),
    }
}

/// Convert a non-negative database integer into a count.
pub(crate) fn to_u32(value: i64, what: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{what} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_maps_to_store_error() {
        assert_eq!(StoreError::from(RepositoryError::NotFound), StoreError::NotFound);
        assert_eq!(
            StoreError::from(RepositoryError::Conflict("slug".into())),
            StoreError::Conflict("slug".into())
        );
        assert!(matches!(
            StoreError::from(RepositoryError::Database(sqlx::Error::PoolTimedOut)),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_to_u32() {
        assert_eq!(to_u32(7, "count").ok(), Some(7));
        assert!(matches!(
            to_u32(-1, "count"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
