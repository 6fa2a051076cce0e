//! Subscription upgrade requests and approved subscription details.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, RequestStatus, SubscriptionRequestId};
use crate::duration::{DurationError, add_duration};

/// An agent's request to move to a paid plan.
///
/// Created `pending` by the agent; an administrator moves it to `approved` or
/// `rejected` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub id: SubscriptionRequestId,
    pub account_id: AccountId,
    pub plan_id: String,
    /// Opaque pointer to the uploaded payment receipt. Never inspected.
    pub receipt_reference: String,
    pub amount: Decimal,
    /// Free-text duration descriptor, e.g. `"6 months"`.
    pub duration: String,
    pub listings_per_month: u32,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SubscriptionRequest {
    /// Subscription details for an approval taking effect on `start`.
    ///
    /// # Errors
    ///
    /// Returns `DurationError` if the duration descriptor cannot produce an end date.
    pub fn approval_details(&self, start: NaiveDate) -> Result<SubscriptionDetails, DurationError> {
        Ok(SubscriptionDetails {
            plan_id: self.plan_id.clone(),
            listings_per_month: self.listings_per_month,
            duration: self.duration.clone(),
            amount: self.amount,
            start_date: start,
            end_date: add_duration(start, &self.duration)?,
            subscription_request_id: self.id,
        })
    }
}

/// Parameters for creating a subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscriptionRequest {
    pub account_id: AccountId,
    pub plan_id: String,
    pub receipt_reference: String,
    pub amount: Decimal,
    pub duration: String,
    pub listings_per_month: u32,
}

impl NewSubscriptionRequest {
    /// Materialize the stored row in its initial `pending` state.
    #[must_use]
    pub fn into_request(
        self,
        id: SubscriptionRequestId,
        created_at: DateTime<Utc>,
    ) -> SubscriptionRequest {
        SubscriptionRequest {
            id,
            account_id: self.account_id,
            plan_id: self.plan_id,
            receipt_reference: self.receipt_reference,
            amount: self.amount,
            duration: self.duration,
            listings_per_month: self.listings_per_month,
            status: RequestStatus::Pending,
            created_at,
            resolved_at: None,
        }
    }
}

/// The paid period recorded on a profile when a request is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDetails {
    pub plan_id: String,
    pub listings_per_month: u32,
    pub duration: String,
    pub amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub subscription_request_id: SubscriptionRequestId,
}
