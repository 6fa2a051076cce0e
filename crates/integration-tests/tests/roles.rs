//! Role resolution: lookup, self-healing and bounded retry.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use listing_portal_core::{AccountId, AccountRole};
use listing_portal_integration_tests::{MemoryStores, PASSWORD, RoleOp, services, signup};
use listing_portal_server::services::{AuthError, RetryPolicy, RoleResolution, RoleResolver};
use secrecy::SecretString;

#[tokio::test]
async fn test_existing_role_is_returned() {
    let stores = MemoryStores::new();
    let account_id = AccountId::generate();
    stores.roles.set(account_id, AccountRole::SuperAdmin);

    let resolution = services(&stores).roles.resolve(account_id).await;

    assert_eq!(resolution, RoleResolution::Confirmed(AccountRole::SuperAdmin));
    assert_eq!(stores.roles.faults.calls(RoleOp::Insert), 0);
}

#[tokio::test]
async fn test_missing_role_is_created_as_agent() {
    let stores = MemoryStores::new();
    let account_id = AccountId::generate();

    let resolution = services(&stores).roles.resolve(account_id).await;

    assert_eq!(resolution, RoleResolution::Confirmed(AccountRole::Agent));
    assert_eq!(stores.roles.get(account_id), Some(AccountRole::Agent));
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let stores = MemoryStores::new();
    let resolver = services(&stores).roles;
    let account_id = AccountId::generate();

    for _ in 0..3 {
        assert_eq!(resolver.resolve(account_id).await.role(), AccountRole::Agent);
    }
    assert_eq!(stores.roles.len(), 1);
    assert_eq!(stores.roles.faults.calls(RoleOp::Insert), 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let stores = MemoryStores::new();
    stores.roles.faults.fail_times(RoleOp::Find, 2);
    let account_id = AccountId::generate();
    stores.roles.set(account_id, AccountRole::SuperAdmin);

    let resolution = services(&stores).roles.resolve(account_id).await;

    assert_eq!(resolution, RoleResolution::Confirmed(AccountRole::SuperAdmin));
    assert_eq!(stores.roles.faults.calls(RoleOp::Find), 3);
}

#[tokio::test]
async fn test_persistent_failure_degrades_to_agent_after_three_attempts() {
    let stores = MemoryStores::new();
    stores.roles.faults.fail_always(RoleOp::Find);
    let account_id = AccountId::generate();
    stores.roles.set(account_id, AccountRole::SuperAdmin);

    let resolution = services(&stores).roles.resolve(account_id).await;

    let RoleResolution::Degraded(degraded) = &resolution else {
        panic!("expected degraded resolution, got {resolution:?}");
    };
    assert_eq!(degraded.attempts, 3);
    assert_eq!(resolution.role(), AccountRole::Agent);
    assert!(!resolution.is_super_admin());
    assert_eq!(stores.roles.faults.calls(RoleOp::Find), 3);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_between_attempts_only() {
    let stores = MemoryStores::new();
    stores.roles.faults.fail_always(RoleOp::Find);
    let resolver = RoleResolver::new(stores.roles.clone(), RetryPolicy::default());

    let started = tokio::time::Instant::now();
    let resolution = resolver.resolve(AccountId::generate()).await;

    assert!(resolution.is_degraded());
    // 1s after the first failure, 2s after the second, none after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_fourth_attempt_waits_four_seconds() {
    let stores = MemoryStores::new();
    stores.roles.faults.fail_always(RoleOp::Find);
    let policy = RetryPolicy {
        attempts: 4,
        ..RetryPolicy::default()
    };
    let resolver = RoleResolver::new(stores.roles.clone(), policy);

    let started = tokio::time::Instant::now();
    let resolution = resolver.resolve(AccountId::generate()).await;

    assert!(resolution.is_degraded());
    assert_eq!(stores.roles.faults.calls(RoleOp::Find), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(7));
}

#[tokio::test]
async fn test_sign_in_heals_missing_role() {
    let stores = MemoryStores::new();
    let services = services(&stores);
    let account = services
        .provisioning
        .provision(signup("jane@example.com", "Jane", "Doe"))
        .await
        .unwrap();
    stores.roles.remove(account.account_id);

    let signed_in = services
        .auth
        .sign_in("jane@example.com", &SecretString::from(PASSWORD.to_string()))
        .await
        .unwrap();

    assert_eq!(signed_in.account_id, account.account_id);
    assert_eq!(signed_in.role, RoleResolution::Confirmed(AccountRole::Agent));
    assert_eq!(stores.roles.get(account.account_id), Some(AccountRole::Agent));
}

#[tokio::test]
async fn test_sign_in_survives_role_outage() {
    let stores = MemoryStores::new();
    let services = services(&stores);
    services
        .provisioning
        .provision(signup("jane@example.com", "Jane", "Doe"))
        .await
        .unwrap();
    stores.roles.faults.fail_always(RoleOp::Find);

    let signed_in = services
        .auth
        .sign_in("jane@example.com", &SecretString::from(PASSWORD.to_string()))
        .await
        .unwrap();

    assert!(signed_in.role.is_degraded());
    assert_eq!(signed_in.role.role(), AccountRole::Agent);
}

#[tokio::test]
async fn test_sign_in_rejects_bad_credentials() {
    let stores = MemoryStores::new();
    let services = services(&stores);
    services
        .provisioning
        .provision(signup("jane@example.com", "Jane", "Doe"))
        .await
        .unwrap();
    let finds_before = stores.roles.faults.calls(RoleOp::Find);

    for (email, password) in [
        ("jane@example.com", "wrong password"),
        ("nobody@example.com", PASSWORD),
        ("not-an-email", PASSWORD),
    ] {
        let err = services
            .auth
            .sign_in(email, &SecretString::from(password.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials), "{email}");
    }
    assert_eq!(stores.roles.faults.calls(RoleOp::Find), finds_before);
}

#[tokio::test]
async fn test_concurrent_resolutions_agree() {
    let stores = MemoryStores::new();
    let resolver = Arc::new(services(&stores).roles);
    let account_id = AccountId::generate();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve(account_id).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            RoleResolution::Confirmed(AccountRole::Agent)
        );
    }
    assert_eq!(stores.roles.len(), 1);
}
