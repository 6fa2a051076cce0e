//! Listing Portal server library.
//!
//! Account provisioning and the subscription lifecycle, exposed as a library
//! so the binary, the operator CLI and the integration tests share one
//! implementation.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - `PostgreSQL` store adapters
//! - [`services`] - Provisioning saga, role resolver, subscriptions, quota, observer
//! - [`routes`] - axum HTTP API
//! - [`middleware`] - Basic-auth extractors
//! - [`error`] - `AppError` and its HTTP mapping
//! - [`state`] - Shared handler state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
