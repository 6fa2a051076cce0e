//! Unified error handling for the HTTP API.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use listing_portal_core::StoreError;

use crate::services::{AuthError, ProvisioningError, QuotaError, SubscriptionError};

/// Realm advertised in `WWW-Authenticate` challenges.
const BASIC_REALM: &str = "Basic realm=\"listing-portal\", charset=\"UTF-8\"";

/// Application-level error type for the portal API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Signup saga failed.
    #[error("Signup failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    /// Subscription lifecycle operation failed.
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Quota lookup or enforcement failed.
    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    /// Sign-in failed.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A store failed outside any workflow.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Provisioning(e) => match e {
                ProvisioningError::Invalid(_) => StatusCode::BAD_REQUEST,
                ProvisioningError::DuplicateEmail => StatusCode::CONFLICT,
                ProvisioningError::IdentityCreationFailed(_)
                | ProvisioningError::SlugExhausted { .. }
                | ProvisioningError::ProfileCreationFailed { .. }
                | ProvisioningError::RoleCreationFailed { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Subscription(e) => match e {
                SubscriptionError::InvalidRequest(_) | SubscriptionError::Duration(_) => {
                    StatusCode::BAD_REQUEST
                }
                SubscriptionError::RequestNotFound | SubscriptionError::AccountNotFound => {
                    StatusCode::NOT_FOUND
                }
                SubscriptionError::InvalidTransition { .. } => StatusCode::CONFLICT,
                SubscriptionError::Reconciliation { .. } | SubscriptionError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Quota(e) => match e {
                QuotaError::AccountNotFound => StatusCode::NOT_FOUND,
                QuotaError::Exceeded { .. } => StatusCode::CONFLICT,
                QuotaError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Provisioning(ProvisioningError::Invalid(e)) => e.to_string(),
            Self::Provisioning(ProvisioningError::DuplicateEmail) => {
                "An account with this email already exists".to_string()
            }
            Self::Provisioning(_) => "Signup could not be completed, please try again".to_string(),
            Self::Subscription(SubscriptionError::Reconciliation { request_id, .. }) => format!(
                "Approval recorded, profile not updated. Reconcile request {request_id} before \
                 treating it as approved"
            ),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid email or password".to_string(),
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg) => msg.clone(),
            e if e.status().is_server_error() => "Internal server error".to_string(),
            Self::Subscription(e) => e.to_string(),
            Self::Quota(e) => e.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Portal request error"
            );
        }

        let body = Json(json!({ "error": self.public_message() }));
        let mut response = (status, body).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_REALM),
            );
        }
        response
    }
}
