//! HTTP route handlers for the portal API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                            - Liveness
//! GET  /health/ready                                      - Database reachability
//!
//! # Auth
//! POST /api/auth/signup                                   - Provision an account
//! POST /api/auth/sign-in                                  - Check credentials, resolve role
//!
//! # Accounts (Basic auth; owner or super admin)
//! GET  /api/accounts/{id}/subscription                    - Summary and quota usage
//! POST /api/accounts/{id}/subscription-requests           - Submit upgrade request (owner)
//! GET  /api/accounts/{id}/subscription-requests/latest    - Most recent request (polling)
//!
//! # Admin (Basic auth; super admin only)
//! GET  /api/admin/subscription-requests                   - Pending requests
//! POST /api/admin/subscription-requests/{id}/approve      - Approve and upgrade
//! POST /api/admin/subscription-requests/{id}/reject       - Reject
//! POST /api/admin/subscription-requests/{id}/reconcile    - Re-apply profile upgrade
//! ```

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Every route, without state or layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(accounts::router())
        .merge(admin::router())
}

/// The complete application with tracing and Sentry layers.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
