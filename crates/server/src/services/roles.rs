//! Role resolution with self-healing.
//!
//! Every sign-in resolves the account's role through [`RoleResolver`]. A
//! missing assignment is created as `agent`; store failures are retried with
//! exponential backoff and, once attempts are exhausted, the caller gets a
//! degraded `agent` default instead of an error.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use listing_portal_core::stores::RoleStore;
use listing_portal_core::{AccountId, AccountRole, StoreError};

/// Bounded retry with exponential backoff.
///
/// Delays run only between attempts, never after the last one. The default
/// three attempts therefore wait 1s then 2s, about 3s in all; the 4s step of
/// the schedule applies only once `attempts` is raised to four or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each later one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    /// Policy with no waiting between attempts.
    #[must_use]
    pub const fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after the failed attempt number `attempt` (1-based).
    ///
    /// 1s, 2s, 4s, ... for the default policy.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: Self::DEFAULT_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }
}

/// Role resolution gave up and fell back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("role resolution degraded after {attempts} attempts: {last_error}")]
pub struct RoleResolutionDegraded {
    pub attempts: u32,
    pub last_error: StoreError,
}

/// Outcome of [`RoleResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleResolution {
    /// The role is persisted in the role store.
    Confirmed(AccountRole),
    /// The store could not be reached; `agent` is returned unpersisted.
    Degraded(RoleResolutionDegraded),
}

impl RoleResolution {
    /// The role to act on. Degraded resolutions are always `agent`.
    #[must_use]
    pub const fn role(&self) -> AccountRole {
        match self {
            Self::Confirmed(role) => *role,
            Self::Degraded(_) => AccountRole::Agent,
        }
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// Whether the account is a confirmed super admin.
    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self, Self::Confirmed(AccountRole::SuperAdmin))
    }
}

/// Idempotent lookup-or-create of an account's role.
#[derive(Clone)]
pub struct RoleResolver {
    roles: Arc<dyn RoleStore>,
    policy: RetryPolicy,
}

impl RoleResolver {
    #[must_use]
    pub fn new(roles: Arc<dyn RoleStore>, policy: RetryPolicy) -> Self {
        Self { roles, policy }
    }

    /// Resolve the account's role, creating an `agent` assignment if none exists.
    ///
    /// Never fails: exhausted retries produce [`RoleResolution::Degraded`].
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn resolve(&self, account_id: AccountId) -> RoleResolution {
        let attempts = self.policy.attempts.max(1);
        let mut last_error = StoreError::Unavailable("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.attempt(account_id).await {
                Ok(role) => return RoleResolution::Confirmed(role),
                Err(e) => {
                    warn!(attempt, max_attempts = attempts, error = %e, "Role resolution attempt failed");
                    last_error = e;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        let degraded = RoleResolutionDegraded {
            attempts,
            last_error,
        };
        warn!(error = %degraded, "Falling back to unconfirmed agent role");
        RoleResolution::Degraded(degraded)
    }

    async fn attempt(&self, account_id: AccountId) -> Result<AccountRole, StoreError> {
        if let Some(role) = self.roles.find(account_id).await? {
            debug!(%role, "Role found");
            return Ok(role);
        }

        match self.roles.insert(account_id, AccountRole::Agent).await {
            Ok(()) => {
                info!("Created missing role assignment");
                Ok(AccountRole::Agent)
            }
            // A concurrent resolution created it first; read the winner.
            Err(StoreError::Conflict(_)) => self
                .roles
                .find(account_id)
                .await?
                .ok_or_else(|| StoreError::Unavailable("role vanished after conflict".to_string())),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(5);
        assert_eq!(policy.delay_after(4), Duration::ZERO);
    }

    #[test]
    fn test_degraded_role_is_agent() {
        let resolution = RoleResolution::Degraded(RoleResolutionDegraded {
            attempts: 3,
            last_error: StoreError::Unavailable("down".into()),
        });
        assert_eq!(resolution.role(), AccountRole::Agent);
        assert!(resolution.is_degraded());
        assert!(!resolution.is_super_admin());
    }

    #[test]
    fn test_confirmed_super_admin() {
        let resolution = RoleResolution::Confirmed(AccountRole::SuperAdmin);
        assert!(resolution.is_super_admin());
        assert!(!resolution.is_degraded());
    }
}
