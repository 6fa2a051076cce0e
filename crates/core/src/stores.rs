//! Contracts for the stores the portal workflows run against.
//!
//! Each store is independent: there is no transaction spanning two of them.
//! The server crate provides `PostgreSQL` adapters; the integration tests use
//! in-memory implementations with failure injection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{
    AccountId, AccountMetadata, AccountRole, Email, NewProfile, NewSubscriptionRequest, Profile,
    ProfilePatch, RequestStatus, Slug, SubscriptionRequest, SubscriptionRequestId,
};

/// Errors surfaced by any store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded into a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The store could not be reached or failed to execute the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Authenticated identities (email + password + metadata).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create an identity and return its stable id.
    ///
    /// Returns `StoreError::Conflict` if the email is already registered.
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
        metadata: &AccountMetadata,
    ) -> StoreResult<AccountId>;

    /// Delete an identity. Used only as a provisioning compensation.
    async fn delete_identity(&self, id: AccountId) -> StoreResult<()>;

    /// Check a password, returning the identity id on success.
    async fn verify_password(&self, email: &Email, password: &str)
    -> StoreResult<Option<AccountId>>;
}

/// Profile rows, one per account.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile. Returns `StoreError::Conflict` on a duplicate id or slug.
    async fn insert(&self, profile: &NewProfile) -> StoreResult<Profile>;

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Profile>>;

    async fn find_by_slug(&self, slug: &Slug) -> StoreResult<Option<Profile>>;

    /// Apply a patch. Returns `StoreError::NotFound` if the profile is missing.
    async fn update(&self, id: AccountId, patch: &ProfilePatch) -> StoreResult<()>;

    async fn delete(&self, id: AccountId) -> StoreResult<()>;
}

/// Role assignments, one per account.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find(&self, account_id: AccountId) -> StoreResult<Option<AccountRole>>;

    /// Returns `StoreError::Conflict` if the account already has a role.
    async fn insert(&self, account_id: AccountId, role: AccountRole) -> StoreResult<()>;

    async fn delete(&self, account_id: AccountId) -> StoreResult<()>;
}

/// Subscription upgrade requests.
#[async_trait]
pub trait SubscriptionRequestStore: Send + Sync {
    async fn insert(&self, request: &NewSubscriptionRequest) -> StoreResult<SubscriptionRequest>;

    async fn get(&self, id: SubscriptionRequestId) -> StoreResult<Option<SubscriptionRequest>>;

    /// The account's most recently created request, in any state.
    async fn latest_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Option<SubscriptionRequest>>;

    /// All `pending` requests, oldest first.
    async fn list_pending(&self) -> StoreResult<Vec<SubscriptionRequest>>;

    /// Move a request from `pending` to `to`.
    ///
    /// The update is conditional on the stored status still being `pending`;
    /// returns `false` (and writes nothing) otherwise.
    async fn transition(
        &self,
        id: SubscriptionRequestId,
        to: RequestStatus,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

/// Listings, consulted only for quota counting.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Number of listings the account created at or after `since`.
    async fn count_created_since(
        &self,
        account_id: AccountId,
        since: DateTime<Utc>,
    ) -> StoreResult<u32>;
}
