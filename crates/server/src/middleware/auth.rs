//! Authentication extractors.
//!
//! Every protected request carries HTTP Basic credentials. The extractor signs
//! in through [`crate::services::AuthService`], so each authenticated request
//! also runs role resolution and repairs a missing role assignment.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use tracing::debug;

use listing_portal_core::{AccountId, AccountRole};

use crate::error::AppError;
use crate::services::{RoleResolution, SignedIn};
use crate::state::AppState;

/// The signed-in account for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentAccount {
    pub account_id: AccountId,
    pub role: RoleResolution,
}

impl CurrentAccount {
    /// Whether this account may act on `account_id`'s resources.
    #[must_use]
    pub fn can_access(&self, account_id: AccountId) -> bool {
        self.account_id == account_id || self.role.is_super_admin()
    }

    #[must_use]
    pub const fn role(&self) -> AccountRole {
        self.role.role()
    }
}

impl From<SignedIn> for CurrentAccount {
    fn from(signed_in: SignedIn) -> Self {
        Self {
            account_id: signed_in.account_id,
            role: signed_in.role,
        }
    }
}

/// Decode `Authorization: Basic ...` into email and password.
#[must_use]
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, SecretString)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;

    Some((email.to_string(), SecretString::from(password.to_string())))
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentAccount, AppError> {
    let (email, password) = basic_credentials(&parts.headers)
        .ok_or_else(|| AppError::Unauthorized("Credentials required".to_string()))?;

    let signed_in = state.services().auth.sign_in(&email, &password).await?;
    Ok(signed_in.into())
}

/// Extractor that requires a signed-in account.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAccount(account): RequireAccount) -> impl IntoResponse {
///     account.account_id.to_string()
/// }
/// ```
pub struct RequireAccount(pub CurrentAccount);

impl FromRequestParts<AppState> for RequireAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

/// Extractor that requires a confirmed super admin.
///
/// A degraded role resolution never grants administrator access.
pub struct RequireSuperAdmin(pub CurrentAccount);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let account = authenticate(parts, state).await?;

        if !account.role.is_super_admin() {
            debug!(
                account_id = %account.account_id,
                degraded = account.role.is_degraded(),
                "Super admin access denied"
            );
            return Err(AppError::Forbidden(
                "Only super admins can access this resource".to_string(),
            ));
        }

        Ok(Self(account))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use listing_portal_core::StoreError;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::services::RoleResolutionDegraded;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials_decodes() {
        let encoded = STANDARD.encode("agent@example.com:s3cret:with:colons");
        let (email, password) = basic_credentials(&headers(&format!("Basic {encoded}"))).unwrap();
        assert_eq!(email, "agent@example.com");
        assert_eq!(password.expose_secret(), "s3cret:with:colons");
    }

    #[test]
    fn test_basic_credentials_rejects_other_schemes() {
        assert!(basic_credentials(&headers("Bearer abc")).is_none());
        assert!(basic_credentials(&headers("Basic !!!not-base64")).is_none());
        assert!(basic_credentials(&HeaderMap::new()).is_none());

        let no_colon = STANDARD.encode("just-an-email");
        assert!(basic_credentials(&headers(&format!("Basic {no_colon}"))).is_none());
    }

    #[test]
    fn test_can_access() {
        let own = AccountId::generate();
        let other = AccountId::generate();

        let agent = CurrentAccount {
            account_id: own,
            role: RoleResolution::Confirmed(AccountRole::Agent),
        };
        assert!(agent.can_access(own));
        assert!(!agent.can_access(other));

        let admin = CurrentAccount {
            account_id: own,
            role: RoleResolution::Confirmed(AccountRole::SuperAdmin),
        };
        assert!(admin.can_access(other));

        let degraded = CurrentAccount {
            account_id: own,
            role: RoleResolution::Degraded(RoleResolutionDegraded {
                attempts: 3,
                last_error: StoreError::Unavailable("down".into()),
            }),
        };
        assert!(!degraded.can_access(other));
        assert_eq!(degraded.role(), AccountRole::Agent);
    }
}
