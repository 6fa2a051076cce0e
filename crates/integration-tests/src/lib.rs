//! Integration tests for the listing portal.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p listing-portal-integration-tests
//! ```
//!
//! No database is needed: the workflows run against the in-memory stores in
//! [`memory`], which support per-operation failure injection through
//! [`faults::Faults`].
//!
//! # Test Categories
//!
//! - `provisioning` - Signup saga, compensation, slug allocation
//! - `roles` - Role resolution retry and self-healing
//! - `subscription_lifecycle` - Submit, approve, reject, reconcile
//! - `quota` - Summaries and listing quota enforcement
//! - `observer` - Client observation loop
//! - `http_api` - Routes, status codes and auth

pub mod faults;
pub mod memory;

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rust_decimal::Decimal;
use secrecy::SecretString;

use listing_portal_core::AccountMetadata;
use listing_portal_server::config::WorkflowConfig;
use listing_portal_server::services::{RetryPolicy, Services, SignupRequest, UpgradeSubmission};
use listing_portal_server::state::AppState;

pub use memory::{CredentialOp, ListingOp, MemoryStores, ProfileOp, RequestOp, RoleOp};

/// Password used by [`signup`].
pub const PASSWORD: &str = "correct horse battery";

/// Workflow settings with no retry delay and a short poll interval.
#[must_use]
pub fn fast_workflow() -> WorkflowConfig {
    WorkflowConfig {
        role_retry: RetryPolicy::immediate(RetryPolicy::DEFAULT_ATTEMPTS),
        slug_max_attempts: 50,
        poll_interval: Duration::from_millis(10),
    }
}

/// Services wired to `stores` with [`fast_workflow`].
#[must_use]
pub fn services(stores: &MemoryStores) -> Services {
    Services::new(&stores.stores(), &fast_workflow())
}

/// HTTP state over `stores`, without a database pool.
#[must_use]
pub fn app_state(stores: &MemoryStores) -> AppState {
    AppState::with_stores(fast_workflow(), &stores.stores(), None)
}

/// A valid signup for `email` and the given name.
#[must_use]
pub fn signup(email: &str, first_name: &str, last_name: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        password: SecretString::from(PASSWORD.to_string()),
        metadata: AccountMetadata {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: None,
            company: None,
        },
    }
}

/// A valid upgrade submission.
#[must_use]
pub fn upgrade(duration: &str, listings_per_month: u32) -> UpgradeSubmission {
    UpgradeSubmission {
        plan_id: "pro-monthly".to_string(),
        receipt_reference: "receipts/2025/03/0001.pdf".to_string(),
        amount: Decimal::new(4999, 2),
        duration: duration.to_string(),
        listings_per_month,
    }
}

/// `Authorization` header value for HTTP Basic credentials.
#[must_use]
pub fn basic_auth(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}
