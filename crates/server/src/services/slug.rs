//! Unique slug allocation against the profile store.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use listing_portal_core::stores::ProfileStore;
use listing_portal_core::{Slug, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugAllocationError {
    /// Every candidate up to the attempt cap is taken.
    #[error("no free slug for {base} after {attempts} attempts")]
    Exhausted { base: Slug, attempts: u32 },

    /// The profile store failed during a collision check.
    #[error("slug lookup failed: {0}")]
    Store(#[source] StoreError),
}

/// Finds the first free slug among `base`, `base-1`, `base-2`, ...
#[derive(Clone)]
pub struct SlugAllocator {
    profiles: Arc<dyn ProfileStore>,
    max_attempts: u32,
}

impl SlugAllocator {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileStore>, max_attempts: u32) -> Self {
        Self {
            profiles,
            max_attempts,
        }
    }

    /// Find the first free candidate, starting at `first_attempt` (0 is the
    /// bare base). Returns the slug with the attempt that produced it, so a
    /// caller that loses the slug on insert can resume at the next one.
    ///
    /// # Errors
    ///
    /// Returns `SlugAllocationError::Exhausted` once the candidates up to
    /// `max_attempts` are taken, or `Store` if a lookup fails.
    #[instrument(skip(self), fields(base = %base))]
    pub async fn allocate(
        &self,
        base: &Slug,
        first_attempt: u32,
    ) -> Result<(Slug, u32), SlugAllocationError> {
        for attempt in first_attempt..self.max_attempts {
            let candidate = candidate(base, attempt);

            let taken = self
                .profiles
                .find_by_slug(&candidate)
                .await
                .map_err(SlugAllocationError::Store)?
                .is_some();

            if !taken {
                debug!(slug = %candidate, attempt, "Allocated slug");
                return Ok((candidate, attempt));
            }
        }

        Err(SlugAllocationError::Exhausted {
            base: base.clone(),
            attempts: self.max_attempts,
        })
    }
}

fn candidate(base: &Slug, attempt: u32) -> Slug {
    if attempt == 0 {
        base.clone()
    } else {
        base.with_suffix(attempt)
    }
}
