//! Role store backed by `portal.role_assignment`.

use async_trait::async_trait;
use sqlx::PgPool;

use listing_portal_core::stores::{RoleStore, StoreResult};
use listing_portal_core::{AccountId, AccountRole};

use super::RepositoryError;

/// `PostgreSQL` implementation of [`RoleStore`].
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    /// Create a new role store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn find(&self, account_id: AccountId) -> StoreResult<Option<AccountRole>> {
        let role = sqlx::query_scalar("SELECT role FROM portal.role_assignment WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(role)
    }

    async fn insert(&self, account_id: AccountId, role: AccountRole) -> StoreResult<()> {
        sqlx::query("INSERT INTO portal.role_assignment (account_id, role) VALUES ($1, $2)")
            .bind(account_id)
            .bind(role)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "account already has a role"))?;
        Ok(())
    }

    async fn delete(&self, account_id: AccountId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM portal.role_assignment WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound.into());
        }
        Ok(())
    }
}
