//! Account-scoped subscription handlers.
//!
//! An account reads its own resources; a super admin may read any account.
//! Submitting an upgrade request is limited to the owner.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;

use listing_portal_core::{AccountId, SubscriptionRequest};

use crate::error::AppError;
use crate::middleware::RequireAccount;
use crate::services::{SubscriptionSummary, UpgradeSubmission};
use crate::state::AppState;

/// Build the accounts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/accounts/{account_id}/subscription", get(summary))
        .route(
            "/api/accounts/{account_id}/subscription-requests",
            post(submit_request),
        )
        .route(
            "/api/accounts/{account_id}/subscription-requests/latest",
            get(latest_request),
        )
}

/// Body for submitting an upgrade request.
///
/// `amount` is a decimal string, e.g. `"49.99"`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequestBody {
    pub plan_id: String,
    pub receipt_reference: String,
    pub amount: Decimal,
    pub duration: String,
    pub listings_per_month: u32,
}

impl From<SubmitRequestBody> for UpgradeSubmission {
    fn from(body: SubmitRequestBody) -> Self {
        Self {
            plan_id: body.plan_id,
            receipt_reference: body.receipt_reference,
            amount: body.amount,
            duration: body.duration,
            listings_per_month: body.listings_per_month,
        }
    }
}

/// Subscription summary with quota usage.
///
/// GET /api/accounts/{account_id}/subscription
///
/// # Errors
///
/// 403 for another agent's account, 404 if the account has no profile.
pub async fn summary(
    RequireAccount(account): RequireAccount,
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<SubscriptionSummary>, AppError> {
    if !account.can_access(account_id) {
        return Err(forbidden());
    }
    let summary = state.services().quota.summary(account_id).await?;
    Ok(Json(summary))
}

/// Submit an upgrade request for review.
///
/// POST /api/accounts/{account_id}/subscription-requests
///
/// # Errors
///
/// 403 unless the caller owns the account, 400 on invalid input.
pub async fn submit_request(
    RequireAccount(account): RequireAccount,
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Json(body): Json<SubmitRequestBody>,
) -> Result<(StatusCode, Json<SubscriptionRequest>), AppError> {
    if account.account_id != account_id {
        return Err(forbidden());
    }
    let request = state
        .services()
        .subscriptions
        .submit(account_id, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// The account's most recent request, polled by waiting clients.
///
/// GET /api/accounts/{account_id}/subscription-requests/latest
///
/// # Errors
///
/// 404 when the account has never submitted a request.
pub async fn latest_request(
    RequireAccount(account): RequireAccount,
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<SubscriptionRequest>, AppError> {
    if !account.can_access(account_id) {
        return Err(forbidden());
    }
    state
        .services()
        .subscriptions
        .latest_for_account(account_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No subscription request".to_string()))
}

fn forbidden() -> AppError {
    AppError::Forbidden("Not allowed to access this account".to_string())
}
