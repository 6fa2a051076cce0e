//! In-memory implementations of every store contract.
//!
//! Each store counts calls per operation and can be told to fail through its
//! [`Faults`] handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use listing_portal_core::stores::{
    CredentialStore, ListingStore, ProfileStore, RoleStore, StoreResult, SubscriptionRequestStore,
};
use listing_portal_core::{
    AccountId, AccountMetadata, AccountRole, Email, NewProfile, NewSubscriptionRequest, Profile,
    ProfilePatch, RequestStatus, Slug, StoreError, SubscriptionRequest, SubscriptionRequestId,
};
use listing_portal_server::services::Stores;

use crate::faults::Faults;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Credentials
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialOp {
    Create,
    Delete,
    Verify,
}

#[derive(Debug, Clone)]
struct Identity {
    id: AccountId,
    password: String,
    metadata: AccountMetadata,
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identities: Mutex<HashMap<Email, Identity>>,
    pub faults: Faults<CredentialOp>,
}

impl MemoryCredentialStore {
    pub fn len(&self) -> usize {
        lock(&self.identities).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: AccountId) -> bool {
        lock(&self.identities).values().any(|identity| identity.id == id)
    }

    pub fn metadata(&self, email: &Email) -> Option<AccountMetadata> {
        lock(&self.identities)
            .get(email)
            .map(|identity| identity.metadata.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
        metadata: &AccountMetadata,
    ) -> StoreResult<AccountId> {
        self.faults.check(CredentialOp::Create)?;
        let mut identities = lock(&self.identities);
        if identities.contains_key(email) {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }

        let id = AccountId::generate();
        identities.insert(
            email.clone(),
            Identity {
                id,
                password: password.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(id)
    }

    async fn delete_identity(&self, id: AccountId) -> StoreResult<()> {
        self.faults.check(CredentialOp::Delete)?;
        let mut identities = lock(&self.identities);
        let before = identities.len();
        identities.retain(|_, identity| identity.id != id);
        if identities.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn verify_password(
        &self,
        email: &Email,
        password: &str,
    ) -> StoreResult<Option<AccountId>> {
        self.faults.check(CredentialOp::Verify)?;
        Ok(lock(&self.identities)
            .get(email)
            .filter(|identity| identity.password == password)
            .map(|identity| identity.id))
    }
}

// =============================================================================
// Profiles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileOp {
    Insert,
    FindById,
    FindBySlug,
    Update,
    Delete,
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<AccountId, Profile>>,
    pub faults: Faults<ProfileOp>,
}

impl MemoryProfileStore {
    pub fn get(&self, id: AccountId) -> Option<Profile> {
        lock(&self.profiles).get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.profiles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a stored profile, e.g. to backdate a subscription.
    pub fn put(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.id, profile);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn insert(&self, profile: &NewProfile) -> StoreResult<Profile> {
        self.faults.check(ProfileOp::Insert)?;
        let mut profiles = lock(&self.profiles);
        if profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict("profile already exists".to_string()));
        }
        if profiles.values().any(|p| p.slug == profile.slug) {
            return Err(StoreError::Conflict("slug already taken".to_string()));
        }

        let stored = profile.clone().into_profile(Utc::now());
        profiles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Profile>> {
        self.faults.check(ProfileOp::FindById)?;
        Ok(self.get(id))
    }

    async fn find_by_slug(&self, slug: &Slug) -> StoreResult<Option<Profile>> {
        self.faults.check(ProfileOp::FindBySlug)?;
        Ok(lock(&self.profiles)
            .values()
            .find(|profile| &profile.slug == slug)
            .cloned())
    }

    async fn update(&self, id: AccountId, patch: &ProfilePatch) -> StoreResult<()> {
        self.faults.check(ProfileOp::Update)?;
        let mut profiles = lock(&self.profiles);
        let profile = profiles.get_mut(&id).ok_or(StoreError::NotFound)?;
        profile.apply(patch);
        Ok(())
    }

    async fn delete(&self, id: AccountId) -> StoreResult<()> {
        self.faults.check(ProfileOp::Delete)?;
        lock(&self.profiles)
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

// =============================================================================
// Roles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleOp {
    Find,
    Insert,
    Delete,
}

#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    roles: Mutex<HashMap<AccountId, AccountRole>>,
    pub faults: Faults<RoleOp>,
}

impl MemoryRoleStore {
    pub fn get(&self, id: AccountId) -> Option<AccountRole> {
        lock(&self.roles).get(&id).copied()
    }

    /// Assign a role directly, bypassing fault injection.
    pub fn set(&self, id: AccountId, role: AccountRole) {
        lock(&self.roles).insert(id, role);
    }

    /// Drop an assignment directly, bypassing fault injection.
    pub fn remove(&self, id: AccountId) {
        lock(&self.roles).remove(&id);
    }

    pub fn len(&self) -> usize {
        lock(&self.roles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn find(&self, account_id: AccountId) -> StoreResult<Option<AccountRole>> {
        self.faults.check(RoleOp::Find)?;
        Ok(self.get(account_id))
    }

    async fn insert(&self, account_id: AccountId, role: AccountRole) -> StoreResult<()> {
        self.faults.check(RoleOp::Insert)?;
        let mut roles = lock(&self.roles);
        if roles.contains_key(&account_id) {
            return Err(StoreError::Conflict("account already has a role".to_string()));
        }
        roles.insert(account_id, role);
        Ok(())
    }

    async fn delete(&self, account_id: AccountId) -> StoreResult<()> {
        self.faults.check(RoleOp::Delete)?;
        lock(&self.roles)
            .remove(&account_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

// =============================================================================
// Subscription requests
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOp {
    Insert,
    Get,
    Latest,
    ListPending,
    Transition,
}

/// Requests in insertion order.
#[derive(Debug, Default)]
pub struct MemorySubscriptionRequestStore {
    requests: Mutex<Vec<SubscriptionRequest>>,
    pub faults: Faults<RequestOp>,
}

impl MemorySubscriptionRequestStore {
    pub fn get_now(&self, id: SubscriptionRequestId) -> Option<SubscriptionRequest> {
        lock(&self.requests).iter().find(|r| r.id == id).cloned()
    }

    /// Set a request's status directly, as another administrator would.
    pub fn force_status(&self, id: SubscriptionRequestId, status: RequestStatus) {
        if let Some(request) = lock(&self.requests).iter_mut().find(|r| r.id == id) {
            request.status = status;
            request.resolved_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl SubscriptionRequestStore for MemorySubscriptionRequestStore {
    async fn insert(&self, request: &NewSubscriptionRequest) -> StoreResult<SubscriptionRequest> {
        self.faults.check(RequestOp::Insert)?;
        let stored = request
            .clone()
            .into_request(SubscriptionRequestId::generate(), Utc::now());
        lock(&self.requests).push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: SubscriptionRequestId) -> StoreResult<Option<SubscriptionRequest>> {
        self.faults.check(RequestOp::Get)?;
        Ok(self.get_now(id))
    }

    async fn latest_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Option<SubscriptionRequest>> {
        self.faults.check(RequestOp::Latest)?;
        // Later insertions win ties on created_at.
        Ok(lock(&self.requests)
            .iter()
            .filter(|r| r.account_id == account_id)
            .fold(None::<&SubscriptionRequest>, |latest, r| match latest {
                Some(l) if l.created_at > r.created_at => Some(l),
                _ => Some(r),
            })
            .cloned())
    }

    async fn list_pending(&self) -> StoreResult<Vec<SubscriptionRequest>> {
        self.faults.check(RequestOp::ListPending)?;
        let mut pending: Vec<_> = lock(&self.requests)
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    async fn transition(
        &self,
        id: SubscriptionRequestId,
        to: RequestStatus,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.faults.check(RequestOp::Transition)?;
        let mut requests = lock(&self.requests);
        match requests
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Pending)
        {
            Some(request) => {
                request.status = to;
                request.resolved_at = Some(resolved_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Listings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingOp {
    Count,
}

#[derive(Debug, Default)]
pub struct MemoryListingStore {
    listings: Mutex<Vec<(AccountId, DateTime<Utc>)>>,
    pub faults: Faults<ListingOp>,
}

impl MemoryListingStore {
    /// Record a listing created at `created_at`.
    pub fn add(&self, account_id: AccountId, created_at: DateTime<Utc>) {
        lock(&self.listings).push((account_id, created_at));
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn count_created_since(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> StoreResult<u32> {
        self.faults.check(ListingOp::Count)?;
        let count = lock(&self.listings)
            .iter()
            .filter(|(owner, created_at)| *owner == account_id && *created_at >= since)
            .count();
        u32::try_from(count).map_err(|_| StoreError::DataCorruption("listing count".to_string()))
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// One of each in-memory store, sharing nothing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStores {
    pub credentials: Arc<MemoryCredentialStore>,
    pub profiles: Arc<MemoryProfileStore>,
    pub roles: Arc<MemoryRoleStore>,
    pub requests: Arc<MemorySubscriptionRequestStore>,
    pub listings: Arc<MemoryListingStore>,
}

impl MemoryStores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object handles for the services.
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            credentials: self.credentials.clone(),
            profiles: self.profiles.clone(),
            roles: self.roles.clone(),
            requests: self.requests.clone(),
            listings: self.listings.clone(),
        }
    }
}
