//! Administrator review of subscription requests (super admin only).

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use tracing::info;

use listing_portal_core::{SubscriptionRequest, SubscriptionRequestId};

use crate::error::AppError;
use crate::middleware::RequireSuperAdmin;
use crate::services::Approval;
use crate::state::AppState;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/subscription-requests", get(list_pending))
        .route(
            "/api/admin/subscription-requests/{request_id}/approve",
            post(approve),
        )
        .route(
            "/api/admin/subscription-requests/{request_id}/reject",
            post(reject),
        )
        .route(
            "/api/admin/subscription-requests/{request_id}/reconcile",
            post(reconcile),
        )
}

/// Pending requests, oldest first.
///
/// GET /api/admin/subscription-requests
///
/// # Errors
///
/// 401/403 unless the caller is a confirmed super admin.
pub async fn list_pending(
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubscriptionRequest>>, AppError> {
    let pending = state.services().subscriptions.pending().await?;
    Ok(Json(pending))
}

/// Approve a pending request and upgrade the account.
///
/// POST /api/admin/subscription-requests/{request_id}/approve
///
/// # Errors
///
/// 404 for an unknown request, 409 if it was already decided, 500 with a
/// reconciliation message if the profile update failed after approval.
pub async fn approve(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(request_id): Path<SubscriptionRequestId>,
) -> Result<Json<Approval>, AppError> {
    info!(admin_id = %admin.account_id, %request_id, "Approving subscription request");
    let approval = state.services().subscriptions.approve(request_id).await?;
    Ok(Json(approval))
}

/// Reject a pending request.
///
/// POST /api/admin/subscription-requests/{request_id}/reject
///
/// # Errors
///
/// 404 for an unknown request, 409 if it was already decided.
pub async fn reject(
    RequireSuperAdmin(admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(request_id): Path<SubscriptionRequestId>,
) -> Result<Json<SubscriptionRequest>, AppError> {
    info!(admin_id = %admin.account_id, %request_id, "Rejecting subscription request");
    let request = state.services().subscriptions.reject(request_id).await?;
    Ok(Json(request))
}

/// Re-apply the profile upgrade of an approved request.
///
/// POST /api/admin/subscription-requests/{request_id}/reconcile
///
/// # Errors
///
/// 404 for an unknown request, 409 unless it is approved.
pub async fn reconcile(
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(request_id): Path<SubscriptionRequestId>,
) -> Result<Json<Approval>, AppError> {
    let approval = state.services().subscriptions.reconcile(request_id).await?;
    Ok(Json(approval))
}
