//! Profile store backed by `portal.profile`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use listing_portal_core::stores::{ProfileStore, StoreResult};
use listing_portal_core::{
    AccountId, AccountMetadata, Email, ListingLimit, NewProfile, Profile, ProfilePatch,
    ProfileStatus, Slug, SubscriptionDetails, SubscriptionStatus,
};

use super::RepositoryError;

const PROFILE_COLUMNS: &str = "id, slug, email, first_name, last_name, phone, company, status, \
     subscription_status, subscription_details, listing_limit, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: AccountId,
    slug: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    company: Option<String>,
    status: ProfileStatus,
    subscription_status: SubscriptionStatus,
    subscription_details: Option<Json<SubscriptionDetails>>,
    listing_limit: Json<ListingLimit>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid slug in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            slug,
            email,
            metadata: AccountMetadata {
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                company: row.company,
            },
            status: row.status,
            subscription_status: row.subscription_status,
            subscription_details: row.subscription_details.map(|Json(details)| details),
            listing_limit: row.listing_limit.0,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL` implementation of [`ProfileStore`].
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Create a new profile store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: AccountId) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM portal.profile WHERE id = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn fetch_by_slug(&self, slug: &Slug) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM portal.profile WHERE slug = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_row(&self, profile: &NewProfile) -> Result<Profile, RepositoryError> {
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            INSERT INTO portal.profile
                (id, slug, email, first_name, last_name, phone, company,
                 status, subscription_status, listing_limit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING created_at
            ",
        )
        .bind(profile.id)
        .bind(profile.slug.as_str())
        .bind(&profile.email)
        .bind(&profile.metadata.first_name)
        .bind(&profile.metadata.last_name)
        .bind(profile.metadata.phone.as_deref())
        .bind(profile.metadata.company.as_deref())
        .bind(profile.status)
        .bind(profile.subscription_status)
        .bind(Json(profile.listing_limit))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "profile id or slug already taken"))?;

        Ok(profile.clone().into_profile(created_at))
    }

    async fn update_row(&self, id: AccountId, patch: &ProfilePatch) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE portal.profile SET
                subscription_status = COALESCE($2, subscription_status),
                subscription_details = COALESCE($3, subscription_details),
                listing_limit = COALESCE($4, listing_limit)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(patch.subscription_status)
        .bind(patch.subscription_details.as_ref().map(Json))
        .bind(patch.listing_limit.map(Json))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn insert(&self, profile: &NewProfile) -> StoreResult<Profile> {
        Ok(self.insert_row(profile).await?)
    }

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Profile>> {
        Ok(self.fetch_by_id(id).await?)
    }

    async fn find_by_slug(&self, slug: &Slug) -> StoreResult<Option<Profile>> {
        Ok(self.fetch_by_slug(slug).await?)
    }

    async fn update(&self, id: AccountId, patch: &ProfilePatch) -> StoreResult<()> {
        Ok(self.update_row(id, patch).await?)
    }

    async fn delete(&self, id: AccountId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM portal.profile WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound.into());
        }
        Ok(())
    }
}
