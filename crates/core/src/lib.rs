//! Listing Portal Core - Shared types library.
//!
//! This crate provides the types and contracts used by every portal component:
//! - `server` - HTTP API hosting the provisioning and subscription workflows
//! - `cli` - Operator tooling for migrations and subscription administration
//! - `integration-tests` - In-memory stores and workflow tests
//!
//! # Architecture
//!
//! The core crate contains only types, pure calculations and traits - no I/O,
//! no database access, no HTTP clients. The store traits in [`stores`] describe
//! the external collaborators; adapters live in the server crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, slugs, statuses, profiles and requests
//! - [`quota`] - Listing limits, period windows and usage percentages
//! - [`duration`] - Subscription end-date and remaining-time arithmetic
//! - [`stores`] - Contracts for the credential, profile, role, request and listing stores

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod duration;
pub mod quota;
pub mod stores;
pub mod types;

pub use duration::{DurationError, Remaining, SubscriptionTerm, add_duration, remaining};
pub use quota::{ListingLimit, QuotaPeriod, usage_percentage};
pub use stores::StoreError;
pub use types::*;
