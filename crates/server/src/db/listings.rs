//! Listing counts for quota enforcement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use listing_portal_core::AccountId;
use listing_portal_core::stores::{ListingStore, StoreResult};

use super::{RepositoryError, to_u32};

/// `PostgreSQL` implementation of [`ListingStore`].
#[derive(Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

impl PgListingStore {
    /// Create a new listing store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn count_created_since(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM portal.listing WHERE account_id = $1 AND created_at >= $2",
        )
        .bind(account_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(to_u32(count, "listing count")?)
    }
}
