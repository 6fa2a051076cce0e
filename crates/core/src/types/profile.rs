//! Profile domain types.
//!
//! A profile is the portal-side record of an account: one per account, keyed
//! by the same id, carrying the public slug, plan tier and listing quota.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Email, ProfileStatus, Slug, SubscriptionDetails, SubscriptionStatus};
use crate::quota::ListingLimit;

/// Contact details captured at signup.
///
/// Stored as metadata on the identity and copied onto the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountMetadata {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl AccountMetadata {
    /// `"{first} {last}"`, the base for slug derivation.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_owned()
    }
}

/// A stored profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: AccountId,
    pub slug: Slug,
    pub email: Email,
    #[serde(flatten)]
    pub metadata: AccountMetadata,
    pub status: ProfileStatus,
    pub subscription_status: SubscriptionStatus,
    pub subscription_details: Option<SubscriptionDetails>,
    pub listing_limit: ListingLimit,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Apply a patch in place. Fields left `None` are untouched.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(status) = patch.subscription_status {
            self.subscription_status = status;
        }
        if let Some(details) = &patch.subscription_details {
            self.subscription_details = Some(details.clone());
        }
        if let Some(limit) = patch.listing_limit {
            self.listing_limit = limit;
        }
    }
}

/// Parameters for inserting a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: AccountId,
    pub slug: Slug,
    pub email: Email,
    pub metadata: AccountMetadata,
    pub status: ProfileStatus,
    pub subscription_status: SubscriptionStatus,
    pub listing_limit: ListingLimit,
}

impl NewProfile {
    /// A fresh signup: active, free plan, five listings per month.
    #[must_use]
    pub fn free(id: AccountId, slug: Slug, email: Email, metadata: AccountMetadata) -> Self {
        Self {
            id,
            slug,
            email,
            metadata,
            status: ProfileStatus::Active,
            subscription_status: SubscriptionStatus::Free,
            listing_limit: ListingLimit::free_default(),
        }
    }

    /// Materialize the stored row.
    #[must_use]
    pub fn into_profile(self, created_at: DateTime<Utc>) -> Profile {
        Profile {
            id: self.id,
            slug: self.slug,
            email: self.email,
            metadata: self.metadata,
            status: self.status,
            subscription_status: self.subscription_status,
            subscription_details: None,
            listing_limit: self.listing_limit,
            created_at,
        }
    }
}

/// Partial update of a profile's subscription fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfilePatch {
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_details: Option<SubscriptionDetails>,
    pub listing_limit: Option<ListingLimit>,
}

impl ProfilePatch {
    /// The mutation an approved upgrade applies: pro tier, the approved
    /// details, and a monthly quota of the plan's listings.
    #[must_use]
    pub fn upgrade(details: SubscriptionDetails) -> Self {
        Self {
            subscription_status: Some(SubscriptionStatus::Pro),
            listing_limit: Some(ListingLimit::monthly(details.listings_per_month)),
            subscription_details: Some(details),
        }
    }

    /// Whether applying the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.subscription_status.is_none()
            && self.subscription_details.is_none()
            && self.listing_limit.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::SubscriptionRequestId;
    use crate::quota::QuotaPeriod;

    fn profile() -> Profile {
        NewProfile::free(
            AccountId::generate(),
            Slug::parse("jane-doe").unwrap(),
            Email::parse("jane@example.com").unwrap(),
            AccountMetadata {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                ..AccountMetadata::default()
            },
        )
        .into_profile(Utc::now())
    }

    #[test]
    fn test_new_profile_defaults() {
        let p = profile();
        assert_eq!(p.status, ProfileStatus::Active);
        assert_eq!(p.subscription_status, SubscriptionStatus::Free);
        assert_eq!(p.listing_limit, ListingLimit::free_default());
        assert!(p.subscription_details.is_none());
    }

    #[test]
    fn test_display_name() {
        let meta = AccountMetadata {
            first_name: " Jane ".into(),
            last_name: String::new(),
            ..AccountMetadata::default()
        };
        assert_eq!(meta.display_name(), "Jane");
    }

    #[test]
    fn test_upgrade_patch() {
        let mut p = profile();
        let details = SubscriptionDetails {
            plan_id: "pro-monthly".into(),
            listings_per_month: 40,
            duration: "1 month".into(),
            amount: Decimal::new(4999, 2),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            subscription_request_id: SubscriptionRequestId::generate(),
        };
        p.apply(&ProfilePatch::upgrade(details.clone()));

        assert_eq!(p.subscription_status, SubscriptionStatus::Pro);
        assert_eq!(p.listing_limit.period, QuotaPeriod::Month);
        assert_eq!(p.listing_limit.value, 40);
        assert_eq!(p.subscription_details, Some(details));
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut p = profile();
        let before = p.clone();
        let patch = ProfilePatch::default();
        assert!(patch.is_empty());
        p.apply(&patch);
        assert_eq!(p, before);
    }
}
