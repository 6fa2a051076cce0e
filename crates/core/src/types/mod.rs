//! Core types for the listing portal.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod profile;
pub mod slug;
pub mod status;
pub mod subscription;

pub use email::{Email, EmailError};
pub use id::*;
pub use profile::{AccountMetadata, NewProfile, Profile, ProfilePatch};
pub use slug::{Slug, SlugError, slugify};
pub use status::*;
pub use subscription::{NewSubscriptionRequest, SubscriptionDetails, SubscriptionRequest};
