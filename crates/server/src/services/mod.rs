//! Portal workflows.
//!
//! # Services
//!
//! - `provisioning` - Signup saga across credential, profile and role stores
//! - `slug` - Unique slug allocation
//! - `roles` - Self-healing role resolution with bounded retry
//! - `auth` - Password sign-in
//! - `subscription` - Upgrade request lifecycle
//! - `quota` - Subscription summaries and listing quota enforcement
//! - `observer` - Polling observation of request decisions

pub mod auth;
pub mod observer;
pub mod provisioning;
pub mod quota;
pub mod roles;
pub mod slug;
pub mod subscription;

use std::sync::Arc;

use listing_portal_core::stores::{
    CredentialStore, ListingStore, ProfileStore, RoleStore, SubscriptionRequestStore,
};

pub use auth::{AuthError, AuthService, SignedIn};
pub use observer::{
    ObservationState, ObserverHandle, RequestTransition, SharedObservation, SubscriptionObserver,
    UpgradeDraft,
};
pub use provisioning::{
    Compensation, CompensationReport, CompensationStep, ProvisionedAccount, ProvisioningError,
    ProvisioningService, SignupRequest, SignupValidationError,
};
pub use quota::{QuotaError, QuotaService, QuotaUsage, SubscriptionSummary};
pub use roles::{RetryPolicy, RoleResolution, RoleResolutionDegraded, RoleResolver};
pub use slug::{SlugAllocationError, SlugAllocator};
pub use subscription::{Approval, SubscriptionError, SubscriptionService, UpgradeSubmission};

use crate::config::WorkflowConfig;

/// Handles to every store the workflows use.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub roles: Arc<dyn RoleStore>,
    pub requests: Arc<dyn SubscriptionRequestStore>,
    pub listings: Arc<dyn ListingStore>,
}

/// Every service, wired to one set of stores.
#[derive(Clone)]
pub struct Services {
    pub provisioning: ProvisioningService,
    pub roles: RoleResolver,
    pub auth: AuthService,
    pub subscriptions: SubscriptionService,
    pub quota: QuotaService,
    pub observer: SubscriptionObserver,
}

impl Services {
    #[must_use]
    pub fn new(stores: &Stores, workflow: &WorkflowConfig) -> Self {
        let roles = RoleResolver::new(Arc::clone(&stores.roles), workflow.role_retry);
        Self {
            provisioning: ProvisioningService::new(stores.clone(), workflow.slug_max_attempts),
            auth: AuthService::new(Arc::clone(&stores.credentials), roles.clone()),
            roles,
            subscriptions: SubscriptionService::new(
                Arc::clone(&stores.requests),
                Arc::clone(&stores.profiles),
            ),
            quota: QuotaService::new(Arc::clone(&stores.profiles), Arc::clone(&stores.listings)),
            observer: SubscriptionObserver::new(Arc::clone(&stores.requests), workflow.poll_interval),
        }
    }
}
