//! HTTP middleware for the portal API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing with status and latency)
//! 3. Auth extractors (per handler, HTTP Basic)

pub mod auth;

pub use auth::{CurrentAccount, RequireAccount, RequireSuperAdmin, basic_credentials};
