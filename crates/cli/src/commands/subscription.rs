//! Subscription request review commands.
//!
//! # Usage
//!
//! ```bash
//! lp-cli subscription pending
//! lp-cli subscription approve <REQUEST_ID>
//! lp-cli subscription reject <REQUEST_ID>
//! lp-cli subscription reconcile <REQUEST_ID>
//! ```

use listing_portal_core::SubscriptionRequestId;

use super::{CliError, services};

/// Log every pending request, oldest first.
///
/// # Errors
///
/// Returns `CliError` on connection or store failure.
pub async fn pending() -> Result<(), CliError> {
    let requests = services().await?.subscriptions.pending().await?;

    if requests.is_empty() {
        tracing::info!("No pending subscription requests");
    }
    for request in &requests {
        tracing::info!(
            "{} account={} plan={} amount={} duration={:?} listings/month={} submitted={}",
            request.id,
            request.account_id,
            request.plan_id,
            request.amount,
            request.duration,
            request.listings_per_month,
            request.created_at.format("%Y-%m-%d %H:%M UTC"),
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns `CliError::Subscription` if the request is unknown, already
/// decided, or was approved without the profile update (reconcile it).
pub async fn approve(request_id: SubscriptionRequestId) -> Result<(), CliError> {
    let approval = services().await?.subscriptions.approve(request_id).await?;
    tracing::info!(
        "Approved {}: account {} is pro until {} ({} listings/month)",
        approval.request_id,
        approval.account_id,
        approval.details.end_date,
        approval.details.listings_per_month
    );
    Ok(())
}

/// # Errors
///
/// Returns `CliError::Subscription` if the request is unknown or already decided.
pub async fn reject(request_id: SubscriptionRequestId) -> Result<(), CliError> {
    let request = services().await?.subscriptions.reject(request_id).await?;
    tracing::info!("Rejected {} for account {}", request.id, request.account_id);
    Ok(())
}

/// # Errors
///
/// Returns `CliError::Subscription` unless the request is approved and the
/// profile update succeeds.
pub async fn reconcile(request_id: SubscriptionRequestId) -> Result<(), CliError> {
    let approval = services().await?.subscriptions.reconcile(request_id).await?;
    tracing::info!(
        "Reconciled {}: account {} is pro until {}",
        approval.request_id,
        approval.account_id,
        approval.details.end_date
    );
    Ok(())
}
