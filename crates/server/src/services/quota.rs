//! Subscription summaries and listing quota enforcement.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use listing_portal_core::stores::{ListingStore, ProfileStore};
use listing_portal_core::{
    AccountId, ListingLimit, Profile, Remaining, Slug, StoreError, SubscriptionDetails,
    SubscriptionStatus, remaining, usage_percentage,
};

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("account not found")]
    AccountNotFound,

    #[error("listing quota exceeded: {used} of {} per {}", .limit.value, .limit.period)]
    Exceeded { used: u32, limit: ListingLimit },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an account sees on its subscription page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    pub account_id: AccountId,
    pub slug: Slug,
    pub subscription_status: SubscriptionStatus,
    pub subscription_details: Option<SubscriptionDetails>,
    /// The limit actually enforced; the free default once a pro plan expired.
    pub listing_limit: ListingLimit,
    pub listings_used: u32,
    pub usage_percentage: u8,
    pub remaining: Option<Remaining>,
    /// e.g. `"1 month, 3 days remaining"` or `"Expired"`.
    pub remaining_display: Option<String>,
    pub expired: bool,
}

/// Current-period usage against the enforced limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: u32,
    pub limit: ListingLimit,
}

/// The limit to enforce for `profile` on `today`.
///
/// A pro plan past its end date falls back to the free default.
#[must_use]
pub fn effective_limit(profile: &Profile, today: NaiveDate) -> ListingLimit {
    match (&profile.subscription_status, &profile.subscription_details) {
        (SubscriptionStatus::Pro, Some(details)) if details.end_date < today => {
            ListingLimit::free_default()
        }
        _ => profile.listing_limit,
    }
}

#[derive(Clone)]
pub struct QuotaService {
    profiles: Arc<dyn ProfileStore>,
    listings: Arc<dyn ListingStore>,
}

impl QuotaService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileStore>, listings: Arc<dyn ListingStore>) -> Self {
        Self { profiles, listings }
    }

    /// # Errors
    ///
    /// Returns `AccountNotFound` or `Store`.
    pub async fn summary(&self, account_id: AccountId) -> Result<SubscriptionSummary, QuotaError> {
        self.summary_at(account_id, Utc::now()).await
    }

    /// Subscription summary as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account has no profile, or `Store`.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn summary_at(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionSummary, QuotaError> {
        let profile = self.profile(account_id).await?;
        let usage = self.usage(&profile, now).await?;

        let remaining = profile
            .subscription_details
            .as_ref()
            .map(|details| remaining(now.date_naive(), details.end_date));

        Ok(SubscriptionSummary {
            account_id,
            slug: profile.slug,
            subscription_status: profile.subscription_status,
            subscription_details: profile.subscription_details,
            listing_limit: usage.limit,
            listings_used: usage.used,
            usage_percentage: usage_percentage(usage.used, usage.limit.value),
            remaining_display: remaining.map(|r| r.to_string()),
            expired: remaining.is_some_and(|r| r.is_expired()),
            remaining,
        })
    }

    /// # Errors
    ///
    /// See [`QuotaService::ensure_can_create_listing_at`].
    pub async fn ensure_can_create_listing(
        &self,
        account_id: AccountId,
    ) -> Result<QuotaUsage, QuotaError> {
        self.ensure_can_create_listing_at(account_id, Utc::now()).await
    }

    /// Check that one more listing fits in the current period.
    ///
    /// # Errors
    ///
    /// Returns `Exceeded` when the period's allowance is used up,
    /// `AccountNotFound`, or `Store`.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn ensure_can_create_listing_at(
        &self,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<QuotaUsage, QuotaError> {
        let profile = self.profile(account_id).await?;
        let usage = self.usage(&profile, now).await?;

        if usage.used >= usage.limit.value {
            debug!(used = usage.used, limit = usage.limit.value, "Listing quota exhausted");
            return Err(QuotaError::Exceeded {
                used: usage.used,
                limit: usage.limit,
            });
        }
        Ok(usage)
    }

    async fn profile(&self, account_id: AccountId) -> Result<Profile, QuotaError> {
        self.profiles
            .find_by_id(account_id)
            .await?
            .ok_or(QuotaError::AccountNotFound)
    }

    async fn usage(&self, profile: &Profile, now: DateTime<Utc>) -> Result<QuotaUsage, QuotaError> {
        let limit = effective_limit(profile, now.date_naive());
        let since = limit.period.window_start_instant(now);
        let used = self.listings.count_created_since(profile.id, since).await?;
        Ok(QuotaUsage { used, limit })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use listing_portal_core::{
        AccountMetadata, Email, NewProfile, ProfilePatch, SubscriptionRequestId,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pro_profile(end_date: NaiveDate) -> Profile {
        let mut profile = NewProfile::free(
            AccountId::generate(),
            Slug::parse("jane-doe").unwrap(),
            Email::parse("jane@example.com").unwrap(),
            AccountMetadata::default(),
        )
        .into_profile(Utc::now());
        profile.apply(&ProfilePatch::upgrade(SubscriptionDetails {
            plan_id: "pro".into(),
            listings_per_month: 40,
            duration: "1 month".into(),
            amount: Decimal::new(20, 0),
            start_date: date(2024, 1, 1),
            end_date,
            subscription_request_id: SubscriptionRequestId::generate(),
        }));
        profile
    }

    #[test]
    fn test_active_pro_limit() {
        let profile = pro_profile(date(2024, 2, 1));
        assert_eq!(effective_limit(&profile, date(2024, 2, 1)).value, 40);
    }

    #[test]
    fn test_expired_pro_falls_back_to_free() {
        let profile = pro_profile(date(2024, 2, 1));
        assert_eq!(
            effective_limit(&profile, date(2024, 2, 2)),
            ListingLimit::free_default()
        );
    }

    #[test]
    fn test_exceeded_message() {
        let err = QuotaError::Exceeded {
            used: 5,
            limit: ListingLimit::free_default(),
        };
        assert_eq!(err.to_string(), "listing quota exceeded: 5 of 5 per month");
    }
}
