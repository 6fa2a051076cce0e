//! Polling observation of request decisions.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::time::{sleep, timeout};

use listing_portal_core::AccountId;
use listing_portal_integration_tests::{MemoryStores, RequestOp, services, signup, upgrade};
use listing_portal_server::services::{
    ObserverHandle, RequestTransition, Services, SharedObservation, UpgradeDraft,
};

const DECISION_WAIT: Duration = Duration::from_secs(2);
const QUIET_WAIT: Duration = Duration::from_millis(100);

async fn setup() -> (MemoryStores, Services, AccountId) {
    let stores = MemoryStores::new();
    let services = services(&stores);
    let account = services
        .provisioning
        .provision(signup("jane@example.com", "Jane", "Doe"))
        .await
        .unwrap();
    (stores, services, account.account_id)
}

/// Wait until at least `polls` more lookups than now have started.
async fn wait_for_polls(stores: &MemoryStores, polls: u32) {
    let target = stores.requests.faults.calls(RequestOp::Latest) + polls;
    timeout(DECISION_WAIT, async {
        while stores.requests.faults.calls(RequestOp::Latest) < target {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

async fn next(handle: &mut ObserverHandle) -> RequestTransition {
    timeout(DECISION_WAIT, handle.next_transition())
        .await
        .unwrap()
        .unwrap()
}

async fn assert_quiet(handle: &mut ObserverHandle) {
    assert!(timeout(QUIET_WAIT, handle.next_transition()).await.is_err());
}

#[tokio::test]
async fn test_approval_is_surfaced_once() {
    let (stores, services, account_id) = setup().await;
    let request = services
        .subscriptions
        .submit(account_id, upgrade("1 month", 20))
        .await
        .unwrap();

    let state = SharedObservation::new();
    let mut handle = services.observer.watch(account_id, state.clone());
    wait_for_polls(&stores, 2).await;

    services.subscriptions.approve(request.id).await.unwrap();

    let RequestTransition::Approved(approved) = next(&mut handle).await else {
        panic!("expected approval");
    };
    assert_eq!(approved.id, request.id);
    assert!(state.was_surfaced(request.id).await);
    assert_quiet(&mut handle).await;

    handle.cancel().await;
}

#[tokio::test]
async fn test_new_observer_does_not_resurface() {
    let (stores, services, account_id) = setup().await;
    let request = services
        .subscriptions
        .submit(account_id, upgrade("1 month", 20))
        .await
        .unwrap();

    let state = SharedObservation::new();
    let mut first = services.observer.watch(account_id, state.clone());
    wait_for_polls(&stores, 2).await;
    services.subscriptions.reject(request.id).await.unwrap();
    assert!(matches!(next(&mut first).await, RequestTransition::Rejected(_)));
    first.cancel().await;

    // Re-entering the page with the same client state.
    let mut second = services.observer.watch(account_id, state.clone());
    wait_for_polls(&stores, 3).await;
    assert_quiet(&mut second).await;
    second.cancel().await;
}

#[tokio::test]
async fn test_rejection_clears_draft() {
    let (stores, services, account_id) = setup().await;
    let request = services
        .subscriptions
        .submit(account_id, upgrade("1 month", 20))
        .await
        .unwrap();

    let state = SharedObservation::new();
    state
        .set_draft(UpgradeDraft {
            plan_id: Some("pro-monthly".to_string()),
            receipt_reference: Some("receipts/draft.pdf".to_string()),
        })
        .await;
    let mut handle = services.observer.watch(account_id, state.clone());
    wait_for_polls(&stores, 2).await;

    services.subscriptions.reject(request.id).await.unwrap();

    assert!(matches!(next(&mut handle).await, RequestTransition::Rejected(_)));
    assert!(state.draft().await.is_empty());
    handle.cancel().await;
}

#[tokio::test]
async fn test_decision_never_seen_pending_is_not_surfaced() {
    let (stores, services, account_id) = setup().await;
    let request = services
        .subscriptions
        .submit(account_id, upgrade("1 month", 20))
        .await
        .unwrap();
    services.subscriptions.approve(request.id).await.unwrap();

    let state = SharedObservation::new();
    let mut handle = services.observer.watch(account_id, state.clone());
    wait_for_polls(&stores, 3).await;

    assert_quiet(&mut handle).await;
    assert!(!state.was_surfaced(request.id).await);
    handle.cancel().await;
}

#[tokio::test]
async fn test_poll_failures_do_not_stop_the_observer() {
    let (stores, services, account_id) = setup().await;
    let request = services
        .subscriptions
        .submit(account_id, upgrade("1 month", 20))
        .await
        .unwrap();
    stores.requests.faults.fail_times(RequestOp::Latest, 3);

    let mut handle = services.observer.watch(account_id, SharedObservation::new());
    wait_for_polls(&stores, 5).await;
    assert!(!handle.is_finished());

    services.subscriptions.approve(request.id).await.unwrap();
    assert!(matches!(next(&mut handle).await, RequestTransition::Approved(_)));
    handle.cancel().await;
}

#[tokio::test]
async fn test_cancel_stops_polling() {
    let (stores, services, account_id) = setup().await;

    let handle = services.observer.watch(account_id, SharedObservation::new());
    wait_for_polls(&stores, 2).await;
    handle.cancel().await;

    let polls = stores.requests.faults.calls(RequestOp::Latest);
    sleep(QUIET_WAIT).await;
    assert_eq!(stores.requests.faults.calls(RequestOp::Latest), polls);
}

#[tokio::test]
async fn test_dropping_the_handle_stops_polling() {
    let (stores, services, account_id) = setup().await;

    let handle = services.observer.watch(account_id, SharedObservation::new());
    wait_for_polls(&stores, 2).await;
    drop(handle);
    // Let the aborted task unwind.
    sleep(Duration::from_millis(20)).await;

    let polls = stores.requests.faults.calls(RequestOp::Latest);
    sleep(QUIET_WAIT).await;
    assert_eq!(stores.requests.faults.calls(RequestOp::Latest), polls);
}
