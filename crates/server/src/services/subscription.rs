//! Subscription request lifecycle.
//!
//! ```text
//! submit ──▶ pending ──approve──▶ approved ──▶ profile upgraded to pro
//!               │
//!               └───reject────▶ rejected (profile untouched)
//! ```
//!
//! Approval writes to two stores. The request transition comes first and is
//! conditional on the stored status still being `pending`, so of two racing
//! administrators exactly one proceeds to the profile update. If that update
//! then fails the request stays `approved` and the caller gets
//! [`SubscriptionError::Reconciliation`]; [`SubscriptionService::reconcile`]
//! re-applies the profile change.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use listing_portal_core::stores::{ProfileStore, SubscriptionRequestStore};
use listing_portal_core::{
    AccountId, DurationError, NewSubscriptionRequest, ProfilePatch, RequestStatus, StoreError,
    SubscriptionDetails, SubscriptionRequest, SubscriptionRequestId,
};

/// Errors from the subscription lifecycle.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Submission input was rejected.
    #[error("invalid subscription request: {0}")]
    InvalidRequest(String),

    #[error("subscription request not found")]
    RequestNotFound,

    #[error("account not found")]
    AccountNotFound,

    /// The request is not in a state this action applies to. Do not retry.
    #[error("subscription request {id} is {from}, cannot move to {to}")]
    InvalidTransition {
        id: SubscriptionRequestId,
        from: RequestStatus,
        to: RequestStatus,
    },

    /// The request's duration could not produce an end date.
    #[error("invalid duration: {0}")]
    Duration(#[from] DurationError),

    /// The request is approved but the profile was not upgraded.
    #[error(
        "request {request_id} is approved but the profile of account {account_id} was not updated: {source}"
    )]
    Reconciliation {
        request_id: SubscriptionRequestId,
        account_id: AccountId,
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input for [`SubscriptionService::submit`].
#[derive(Debug, Clone)]
pub struct UpgradeSubmission {
    pub plan_id: String,
    pub receipt_reference: String,
    pub amount: Decimal,
    pub duration: String,
    pub listings_per_month: u32,
}

/// Result of a successful approval or reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub request_id: SubscriptionRequestId,
    pub account_id: AccountId,
    pub details: SubscriptionDetails,
}

/// Submission, approval, rejection and reconciliation of upgrade requests.
#[derive(Clone)]
pub struct SubscriptionService {
    requests: Arc<dyn SubscriptionRequestStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl SubscriptionService {
    #[must_use]
    pub fn new(
        requests: Arc<dyn SubscriptionRequestStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self { requests, profiles }
    }

    /// Create a `pending` upgrade request for an account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for bad input, `AccountNotFound` if the
    /// account has no profile, or `Store` on store failure.
    #[instrument(skip(self, submission), fields(account_id = %account_id, plan_id = %submission.plan_id))]
    pub async fn submit(
        &self,
        account_id: AccountId,
        submission: UpgradeSubmission,
    ) -> Result<SubscriptionRequest, SubscriptionError> {
        let request = validate_submission(account_id, submission)?;

        if self.profiles.find_by_id(account_id).await?.is_none() {
            return Err(SubscriptionError::AccountNotFound);
        }

        let created = self.requests.insert(&request).await?;
        info!(request_id = %created.id, "Subscription request submitted");
        Ok(created)
    }

    /// The account's most recent request, in any state.
    ///
    /// # Errors
    ///
    /// Returns `Store` on store failure.
    pub async fn latest_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<SubscriptionRequest>, SubscriptionError> {
        Ok(self.requests.latest_for_account(account_id).await?)
    }

    /// Requests awaiting an administrator, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` on store failure.
    pub async fn pending(&self) -> Result<Vec<SubscriptionRequest>, SubscriptionError> {
        Ok(self.requests.list_pending().await?)
    }

    /// Approve a pending request, starting the paid period today (UTC).
    ///
    /// # Errors
    ///
    /// See [`SubscriptionService::approve_at`].
    pub async fn approve(
        &self,
        id: SubscriptionRequestId,
    ) -> Result<Approval, SubscriptionError> {
        self.approve_at(id, Utc::now()).await
    }

    /// Approve a pending request as of `now`.
    ///
    /// # Errors
    ///
    /// - `RequestNotFound` if the request does not exist
    /// - `InvalidTransition` if it is not `pending`, including when another
    ///   approval or rejection wins a race
    /// - `Duration` if no end date can be computed (nothing is written)
    /// - `Reconciliation` if the request was approved but the profile update failed
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn approve_at(
        &self,
        id: SubscriptionRequestId,
        now: DateTime<Utc>,
    ) -> Result<Approval, SubscriptionError> {
        let request = self.load_pending(id, RequestStatus::Approved).await?;
        let details = request.approval_details(now.date_naive())?;

        self.transition(&request, RequestStatus::Approved, now).await?;

        self.apply_upgrade(&request, details.clone()).await?;
        info!(
            account_id = %request.account_id,
            plan_id = %details.plan_id,
            end_date = %details.end_date,
            "Subscription request approved"
        );

        Ok(Approval {
            request_id: id,
            account_id: request.account_id,
            details,
        })
    }

    /// Reject a pending request. The profile is not touched.
    ///
    /// # Errors
    ///
    /// See [`SubscriptionService::reject_at`].
    pub async fn reject(
        &self,
        id: SubscriptionRequestId,
    ) -> Result<SubscriptionRequest, SubscriptionError> {
        self.reject_at(id, Utc::now()).await
    }

    /// Reject a pending request as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound`, `InvalidTransition` or `Store`.
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn reject_at(
        &self,
        id: SubscriptionRequestId,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionRequest, SubscriptionError> {
        let mut request = self.load_pending(id, RequestStatus::Rejected).await?;
        self.transition(&request, RequestStatus::Rejected, now).await?;

        request.status = RequestStatus::Rejected;
        request.resolved_at = Some(now);
        info!(account_id = %request.account_id, "Subscription request rejected");
        Ok(request)
    }

    /// Re-apply the profile upgrade of an approved request.
    ///
    /// The paid period starts on the UTC date the request was approved.
    /// Running it again after success is harmless.
    ///
    /// # Errors
    ///
    /// - `RequestNotFound` if the request does not exist
    /// - `InvalidTransition` if the request is not `approved`
    /// - `Reconciliation` if the profile update fails again
    #[instrument(skip(self), fields(request_id = %id))]
    pub async fn reconcile(
        &self,
        id: SubscriptionRequestId,
    ) -> Result<Approval, SubscriptionError> {
        let request = self
            .requests
            .get(id)
            .await?
            .ok_or(SubscriptionError::RequestNotFound)?;

        if request.status != RequestStatus::Approved {
            return Err(SubscriptionError::InvalidTransition {
                id,
                from: request.status,
                to: RequestStatus::Approved,
            });
        }

        let start = approval_date(&request)?;
        let details = request.approval_details(start)?;
        self.apply_upgrade(&request, details.clone()).await?;
        info!(account_id = %request.account_id, "Subscription reconciled");

        Ok(Approval {
            request_id: id,
            account_id: request.account_id,
            details,
        })
    }

    async fn load_pending(
        &self,
        id: SubscriptionRequestId,
        to: RequestStatus,
    ) -> Result<SubscriptionRequest, SubscriptionError> {
        let request = self
            .requests
            .get(id)
            .await?
            .ok_or(SubscriptionError::RequestNotFound)?;

        if !request.status.can_transition_to(to) {
            warn!(from = %request.status, %to, "Rejected transition out of terminal state");
            return Err(SubscriptionError::InvalidTransition {
                id,
                from: request.status,
                to,
            });
        }
        Ok(request)
    }

    async fn transition(
        &self,
        request: &SubscriptionRequest,
        to: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if self.requests.transition(request.id, to, now).await? {
            return Ok(());
        }

        // Lost a race: report the state the winner left behind.
        let from = self
            .requests
            .get(request.id)
            .await?
            .map_or(request.status, |current| current.status);
        warn!(%from, %to, "Concurrent transition won by another caller");
        Err(SubscriptionError::InvalidTransition {
            id: request.id,
            from,
            to,
        })
    }

    async fn apply_upgrade(
        &self,
        request: &SubscriptionRequest,
        details: SubscriptionDetails,
    ) -> Result<(), SubscriptionError> {
        let patch = ProfilePatch::upgrade(details);
        if let Err(source) = self.profiles.update(request.account_id, &patch).await {
            error!(
                request_id = %request.id,
                account_id = %request.account_id,
                error = %source,
                "Request approved but profile update failed, reconciliation required"
            );
            return Err(SubscriptionError::Reconciliation {
                request_id: request.id,
                account_id: request.account_id,
                source,
            });
        }
        Ok(())
    }
}

fn approval_date(request: &SubscriptionRequest) -> Result<NaiveDate, SubscriptionError> {
    request
        .resolved_at
        .map(|at| at.date_naive())
        .ok_or_else(|| {
            SubscriptionError::Store(StoreError::DataCorruption(format!(
                "approved request {} has no resolution time",
                request.id
            )))
        })
}

fn validate_submission(
    account_id: AccountId,
    submission: UpgradeSubmission,
) -> Result<NewSubscriptionRequest, SubscriptionError> {
    let plan_id = submission.plan_id.trim();
    let receipt_reference = submission.receipt_reference.trim();
    let duration = submission.duration.trim();

    if plan_id.is_empty() {
        return Err(SubscriptionError::InvalidRequest("plan id is required".into()));
    }
    if receipt_reference.is_empty() {
        return Err(SubscriptionError::InvalidRequest(
            "receipt reference is required".into(),
        ));
    }
    if duration.is_empty() {
        return Err(SubscriptionError::InvalidRequest("duration is required".into()));
    }
    if submission.listings_per_month == 0 {
        return Err(SubscriptionError::InvalidRequest(
            "listings_per_month must be greater than zero".into(),
        ));
    }
    if i32::try_from(submission.listings_per_month).is_err() {
        return Err(SubscriptionError::InvalidRequest(
            "listings_per_month is too large".into(),
        ));
    }
    if submission.amount.is_sign_negative() {
        return Err(SubscriptionError::InvalidRequest(
            "amount cannot be negative".into(),
        ));
    }

    Ok(NewSubscriptionRequest {
        account_id,
        plan_id: plan_id.to_owned(),
        receipt_reference: receipt_reference.to_owned(),
        amount: submission.amount,
        duration: duration.to_owned(),
        listings_per_month: submission.listings_per_month,
    })
}
