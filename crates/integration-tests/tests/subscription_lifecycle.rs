//! Upgrade request lifecycle: submit, approve, reject and reconcile.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use listing_portal_core::{
    AccountId, ListingLimit, RequestStatus, SubscriptionRequestId, SubscriptionStatus,
};
use listing_portal_integration_tests::{
    MemoryStores, ProfileOp, RequestOp, services, signup, upgrade,
};
use listing_portal_server::services::{ProvisionedAccount, Services, SubscriptionError};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup() -> (MemoryStores, Services, ProvisionedAccount) {
    let stores = MemoryStores::new();
    let services = services(&stores);
    let account = services
        .provisioning
        .provision(signup("jane@example.com", "Jane", "Doe"))
        .await
        .unwrap();
    (stores, services, account)
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_creates_pending_request() {
    let (_stores, services, account) = setup().await;

    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("6 months", 20))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.account_id, account.account_id);
    assert_eq!(request.listings_per_month, 20);
    assert!(request.resolved_at.is_none());

    let latest = services
        .subscriptions
        .latest_for_account(account.account_id)
        .await
        .unwrap();
    assert_eq!(latest, Some(request.clone()));
    assert_eq!(services.subscriptions.pending().await.unwrap(), vec![request]);
}

#[tokio::test]
async fn test_submit_rejects_bad_input_and_unknown_account() {
    let (stores, services, account) = setup().await;

    let err = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SubscriptionError::InvalidRequest(_)));

    let err = services
        .subscriptions
        .submit(AccountId::generate(), upgrade("1 month", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, SubscriptionError::AccountNotFound));

    assert_eq!(stores.requests.faults.calls(RequestOp::Insert), 0);
}

#[tokio::test]
async fn test_multiple_pending_requests_are_allowed() {
    let (_stores, services, account) = setup().await;

    let first = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();
    let second = services
        .subscriptions
        .submit(account.account_id, upgrade("1 year", 30))
        .await
        .unwrap();

    assert_eq!(services.subscriptions.pending().await.unwrap().len(), 2);
    let latest = services
        .subscriptions
        .latest_for_account(account.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, second.id);
    assert_ne!(latest.id, first.id);
}

// =============================================================================
// Approval
// =============================================================================

#[tokio::test]
async fn test_approve_upgrades_profile() {
    let (stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("6 months", 20))
        .await
        .unwrap();

    let approval = services
        .subscriptions
        .approve_at(request.id, at(2025, 3, 10))
        .await
        .unwrap();

    assert_eq!(approval.details.start_date, date(2025, 3, 10));
    assert_eq!(approval.details.end_date, date(2025, 9, 10));
    assert_eq!(approval.details.subscription_request_id, request.id);

    let profile = stores.profiles.get(account.account_id).unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::Pro);
    assert_eq!(profile.listing_limit, ListingLimit::monthly(20));
    assert_eq!(profile.subscription_details, Some(approval.details));

    let stored = stores.requests.get_now(request.id).unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);
    assert_eq!(stored.resolved_at, Some(at(2025, 3, 10)));
    assert!(services.subscriptions.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_month_end_clamps() {
    let (_stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();

    let approval = services
        .subscriptions
        .approve_at(request.id, at(2025, 1, 31))
        .await
        .unwrap();

    assert_eq!(approval.details.end_date, date(2025, 2, 28));
}

#[tokio::test]
async fn test_second_approval_is_rejected_and_profile_updated_once() {
    let (stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();

    services.subscriptions.approve(request.id).await.unwrap();
    let err = services.subscriptions.approve(request.id).await.unwrap_err();

    assert!(matches!(
        err,
        SubscriptionError::InvalidTransition {
            from: RequestStatus::Approved,
            to: RequestStatus::Approved,
            ..
        }
    ));
    assert_eq!(stores.profiles.faults.calls(ProfileOp::Update), 1);
}

#[tokio::test]
async fn test_concurrent_approvals_mutate_profile_once() {
    let (stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();

    let a = services.subscriptions.clone();
    let b = services.subscriptions.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.approve(request.id).await }),
        tokio::spawn(async move { b.approve(request.id).await }),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(SubscriptionError::InvalidTransition { .. })
    )));
    assert_eq!(stores.profiles.faults.calls(ProfileOp::Update), 1);
}

#[tokio::test]
async fn test_transition_lost_to_another_admin() {
    let (stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();

    // Another administrator rejects the request directly in the store.
    stores
        .requests
        .force_status(request.id, RequestStatus::Rejected);

    let err = services.subscriptions.approve(request.id).await.unwrap_err();
    assert!(matches!(
        err,
        SubscriptionError::InvalidTransition {
            from: RequestStatus::Rejected,
            ..
        }
    ));
    assert_eq!(stores.profiles.faults.calls(ProfileOp::Update), 0);
}

#[tokio::test]
async fn test_unknown_request() {
    let (_stores, services, _account) = setup().await;
    let id = SubscriptionRequestId::generate();

    assert!(matches!(
        services.subscriptions.approve(id).await.unwrap_err(),
        SubscriptionError::RequestNotFound
    ));
    assert!(matches!(
        services.subscriptions.reject(id).await.unwrap_err(),
        SubscriptionError::RequestNotFound
    ));
}

#[tokio::test]
async fn test_unusable_duration_writes_nothing() {
    let (stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("99999999999 months", 10))
        .await
        .unwrap();

    let err = services.subscriptions.approve(request.id).await.unwrap_err();

    assert!(matches!(err, SubscriptionError::Duration(_)));
    assert_eq!(
        stores.requests.get_now(request.id).unwrap().status,
        RequestStatus::Pending
    );
    assert_eq!(stores.requests.faults.calls(RequestOp::Transition), 0);
    assert_eq!(stores.profiles.faults.calls(ProfileOp::Update), 0);
}

// =============================================================================
// Rejection
// =============================================================================

#[tokio::test]
async fn test_reject_leaves_profile_untouched() {
    let (stores, services, account) = setup().await;
    let before = stores.profiles.get(account.account_id).unwrap();
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();

    let rejected = services
        .subscriptions
        .reject_at(request.id, at(2025, 3, 10))
        .await
        .unwrap();

    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.resolved_at, Some(at(2025, 3, 10)));
    assert_eq!(stores.profiles.get(account.account_id).unwrap(), before);
    assert_eq!(stores.profiles.faults.calls(ProfileOp::Update), 0);

    let err = services.subscriptions.approve(request.id).await.unwrap_err();
    assert!(matches!(
        err,
        SubscriptionError::InvalidTransition {
            from: RequestStatus::Rejected,
            ..
        }
    ));
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_profile_failure_after_approval_is_reconcilable() {
    let (stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 year", 40))
        .await
        .unwrap();
    stores.profiles.faults.fail_always(ProfileOp::Update);

    let err = services
        .subscriptions
        .approve_at(request.id, at(2025, 3, 10))
        .await
        .unwrap_err();

    let SubscriptionError::Reconciliation {
        request_id,
        account_id,
        ..
    } = err
    else {
        panic!("expected Reconciliation");
    };
    assert_eq!(request_id, request.id);
    assert_eq!(account_id, account.account_id);

    // The approval stands; the profile is still free.
    assert_eq!(
        stores.requests.get_now(request.id).unwrap().status,
        RequestStatus::Approved
    );
    assert_eq!(
        stores
            .profiles
            .get(account.account_id)
            .unwrap()
            .subscription_status,
        SubscriptionStatus::Free
    );

    // Approving again is not the retry path.
    assert!(matches!(
        services.subscriptions.approve(request.id).await.unwrap_err(),
        SubscriptionError::InvalidTransition { .. }
    ));

    stores.profiles.faults.heal(ProfileOp::Update);
    let approval = services.subscriptions.reconcile(request.id).await.unwrap();

    assert_eq!(approval.details.start_date, date(2025, 3, 10));
    assert_eq!(approval.details.end_date, date(2026, 3, 10));
    let profile = stores.profiles.get(account.account_id).unwrap();
    assert_eq!(profile.subscription_status, SubscriptionStatus::Pro);
    assert_eq!(profile.listing_limit, ListingLimit::monthly(40));

    // Idempotent.
    let again = services.subscriptions.reconcile(request.id).await.unwrap();
    assert_eq!(again, approval);
    assert_eq!(stores.profiles.get(account.account_id).unwrap(), profile);
}

#[tokio::test]
async fn test_reconcile_requires_approved_request() {
    let (_stores, services, account) = setup().await;
    let request = services
        .subscriptions
        .submit(account.account_id, upgrade("1 month", 10))
        .await
        .unwrap();

    let err = services.subscriptions.reconcile(request.id).await.unwrap_err();
    assert!(matches!(
        err,
        SubscriptionError::InvalidTransition {
            from: RequestStatus::Pending,
            ..
        }
    ));

    services.subscriptions.reject(request.id).await.unwrap();
    let err = services.subscriptions.reconcile(request.id).await.unwrap_err();
    assert!(matches!(
        err,
        SubscriptionError::InvalidTransition {
            from: RequestStatus::Rejected,
            ..
        }
    ));
}
