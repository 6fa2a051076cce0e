//! Subscription request store backed by `portal.subscription_request`.
//!
//! Status changes go through [`SubscriptionRequestStore::transition`], a
//! single conditional `UPDATE` guarded on `status = 'pending'`. Two
//! administrators racing on the same request cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use listing_portal_core::stores::{StoreResult, SubscriptionRequestStore};
use listing_portal_core::{
    AccountId, NewSubscriptionRequest, RequestStatus, SubscriptionRequest, SubscriptionRequestId,
};

use super::{RepositoryError, to_u32};

const REQUEST_COLUMNS: &str = "id, account_id, plan_id, receipt_reference, amount, duration, \
     listings_per_month, status, created_at, resolved_at";

/// Newest first. `NOW()` is the transaction start time, so `created_at` can
/// tie; `seq` is the insertion order.
const NEWEST_FIRST: &str = "created_at DESC, seq DESC";
const OLDEST_FIRST: &str = "created_at ASC, seq ASC";

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRequestRow {
    id: SubscriptionRequestId,
    account_id: AccountId,
    plan_id: String,
    receipt_reference: String,
    amount: Decimal,
    duration: String,
    listings_per_month: i32,
    status: RequestStatus,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriptionRequestRow> for SubscriptionRequest {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            plan_id: row.plan_id,
            receipt_reference: row.receipt_reference,
            amount: row.amount,
            duration: row.duration,
            listings_per_month: to_u32(i64::from(row.listings_per_month), "listings_per_month")?,
            status: row.status,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

/// `PostgreSQL` implementation of [`SubscriptionRequestStore`].
#[derive(Clone)]
pub struct PgSubscriptionRequestStore {
    pool: PgPool,
}

impl PgSubscriptionRequestStore {
    /// Create a new subscription request store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(
        &self,
        request: &NewSubscriptionRequest,
    ) -> Result<SubscriptionRequest, RepositoryError> {
        let id = SubscriptionRequestId::generate();
        let listings_per_month = i32::try_from(request.listings_per_month).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "listings_per_month exceeds storage range: {}",
                request.listings_per_month
            ))
        })?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            INSERT INTO portal.subscription_request
                (id, account_id, plan_id, receipt_reference, amount, duration, listings_per_month)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            ",
        )
        .bind(id)
        .bind(request.account_id)
        .bind(&request.plan_id)
        .bind(&request.receipt_reference)
        .bind(request.amount)
        .bind(&request.duration)
        .bind(listings_per_month)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "subscription request already exists"))?;

        Ok(request.clone().into_request(id, created_at))
    }

    async fn fetch_many(
        &self,
        sql: &str,
        account_id: Option<AccountId>,
    ) -> Result<Vec<SubscriptionRequest>, RepositoryError> {
        let mut query = sqlx::query_as::<_, SubscriptionRequestRow>(sql);
        if let Some(account_id) = account_id {
            query = query.bind(account_id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl SubscriptionRequestStore for PgSubscriptionRequestStore {
    async fn insert(&self, request: &NewSubscriptionRequest) -> StoreResult<SubscriptionRequest> {
        Ok(self.insert_row(request).await?)
    }

    async fn get(&self, id: SubscriptionRequestId) -> StoreResult<Option<SubscriptionRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM portal.subscription_request WHERE id = $1");
        let row = sqlx::query_as::<_, SubscriptionRequestRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(TryInto::try_into).transpose()?)
    }

    async fn latest_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Option<SubscriptionRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM portal.subscription_request \
             WHERE account_id = $1 ORDER BY {NEWEST_FIRST} LIMIT 1"
        );
        let mut rows = self.fetch_many(&sql, Some(account_id)).await?;
        Ok(rows.pop())
    }

    async fn list_pending(&self) -> StoreResult<Vec<SubscriptionRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM portal.subscription_request \
             WHERE status = 'pending' ORDER BY {OLDEST_FIRST}"
        );
        Ok(self.fetch_many(&sql, None).await?)
    }

    async fn transition(
        &self,
        id: SubscriptionRequestId,
        to: RequestStatus,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE portal.subscription_request
            SET status = $2, resolved_at = $3
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id)
        .bind(to)
        .bind(resolved_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MIGRATION: &str =
        include_str!("../../migrations/20250301000003_create_subscription_requests.sql");

    #[test]
    fn test_ordering_breaks_ties_by_insertion_sequence() {
        assert!(NEWEST_FIRST.ends_with("seq DESC"));
        assert!(OLDEST_FIRST.ends_with("seq ASC"));
        let seq = MIGRATION.lines().find(|l| l.trim_start().starts_with("seq ")).unwrap();
        assert!(seq.contains("GENERATED ALWAYS AS IDENTITY"));
    }
}
