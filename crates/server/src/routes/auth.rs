//! Signup and sign-in handlers.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use listing_portal_core::{AccountId, AccountMetadata, AccountRole, Slug};

use crate::error::AppError;
use crate::services::SignupRequest;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/sign-in", post(sign_in))
}

/// Signup form. No `Debug`: it carries the password.
#[derive(Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl From<SignupForm> for SignupRequest {
    fn from(form: SignupForm) -> Self {
        Self {
            email: form.email,
            password: SecretString::from(form.password),
            metadata: AccountMetadata {
                first_name: form.first_name,
                last_name: form.last_name,
                phone: form.phone,
                company: form.company,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub account_id: AccountId,
    pub slug: Slug,
    pub role: AccountRole,
}

/// Sign-in form. No `Debug`: it carries the password.
#[derive(Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub account_id: AccountId,
    pub role: AccountRole,
    /// The role store was unreachable and `role` is the unpersisted default.
    pub degraded: bool,
}

/// Provision a new account.
///
/// POST /api/auth/signup
///
/// # Errors
///
/// 400 on invalid input, 409 on a registered email, 500 when a step fails
/// (everything created so far has been rolled back).
pub async fn signup(
    State(state): State<AppState>,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let account = state.services().provisioning.provision(form.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            account_id: account.account_id,
            slug: account.profile.slug,
            role: account.role,
        }),
    ))
}

/// Check credentials and resolve the account's role.
///
/// POST /api/auth/sign-in
///
/// # Errors
///
/// 401 on unknown email or wrong password.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(form): Json<SignInForm>,
) -> Result<Json<SignInResponse>, AppError> {
    let password = SecretString::from(form.password);
    let signed_in = state.services().auth.sign_in(&form.email, &password).await?;

    Ok(Json(SignInResponse {
        account_id: signed_in.account_id,
        role: signed_in.role.role(),
        degraded: signed_in.role.is_degraded(),
    }))
}
