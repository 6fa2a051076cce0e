//! Password sign-in.
//!
//! Every successful sign-in runs the role resolver, which repairs a missing
//! role assignment as a side effect.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};

use listing_portal_core::stores::CredentialStore;
use listing_portal_core::{AccountId, Email, StoreError};

use super::roles::{RoleResolution, RoleResolver};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A verified account and its resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub account_id: AccountId,
    pub role: RoleResolution,
}

#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    roles: RoleResolver,
}

impl AuthService {
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, roles: RoleResolver) -> Self {
        Self { credentials, roles }
    }

    /// Verify credentials and resolve the account's role.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for a malformed email, unknown account or
    /// wrong password, and `Store` if the credential store fails. Role store
    /// failures never fail sign-in; they produce a degraded role.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<SignedIn, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Err(AuthError::InvalidCredentials);
        };

        let account_id = self
            .credentials
            .verify_password(&email, password.expose_secret())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let role = self.roles.resolve(account_id).await;
        debug!(%account_id, role = %role.role(), degraded = role.is_degraded(), "Signed in");

        Ok(SignedIn { account_id, role })
    }
}
