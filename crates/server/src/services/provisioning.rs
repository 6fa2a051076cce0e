//! Account provisioning.
//!
//! Signup spans three stores with no shared transaction: the credential
//! store, the profile store and the role store. [`ProvisioningService`] runs
//! the steps strictly in order and records an undo action after each one
//! that created something. When a later step fails, the recorded undos run
//! newest first and the caller gets an error carrying their outcome.
//!
//! ```text
//! 1. create identity   ── undo: delete identity
//! 2. allocate slug
//! 3. insert profile    ── undo: delete profile
//! 4. insert role
//! ```
//!
//! Steps 3 and 4 check for an existing row before inserting, so a retried
//! step never duplicates a partial artifact. If a concurrent signup takes
//! the slug between steps 2 and 3, step 2 resumes at the next candidate.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use listing_portal_core::{
    AccountId, AccountMetadata, AccountRole, Email, EmailError, NewProfile, Profile, Slug,
    StoreError, slugify,
};

use super::Stores;
use super::slug::{SlugAllocationError, SlugAllocator};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Requests and Results
// =============================================================================

/// Everything a new account needs.
pub struct SignupRequest {
    pub email: String,
    pub password: SecretString,
    pub metadata: AccountMetadata,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// A fully provisioned account.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub account_id: AccountId,
    pub profile: Profile,
    pub role: AccountRole,
}

// =============================================================================
// Errors
// =============================================================================

/// Signup input rejected before anything was created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupValidationError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("first name is required")]
    MissingFirstName,
    #[error("last name is required")]
    MissingLastName,
}

/// Undo action for a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    DeleteIdentity(AccountId),
    DeleteProfile(AccountId),
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteIdentity(_) => write!(f, "delete identity"),
            Self::DeleteProfile(_) => write!(f, "delete profile"),
        }
    }
}

/// Outcome of one compensation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationStep {
    pub action: Compensation,
    pub result: Result<(), StoreError>,
}

/// Outcome of every compensation run after a failed step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompensationReport {
    pub steps: Vec<CompensationStep>,
}

impl CompensationReport {
    /// Whether every compensation succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|step| step.result.is_ok())
    }
}

impl fmt::Display for CompensationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "nothing to roll back");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            match &step.result {
                Ok(()) => write!(f, "{}: ok", step.action)?,
                Err(e) => write!(f, "{}: failed ({e})", step.action)?,
            }
        }
        Ok(())
    }
}

/// Signup failed. Nothing created by the attempt survives, unless the
/// embedded [`CompensationReport`] says otherwise.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Invalid(#[from] SignupValidationError),

    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("identity creation failed: {0}")]
    IdentityCreationFailed(#[source] StoreError),

    #[error("no free slug for {base} after {attempts} attempts (rollback: {compensation})")]
    SlugExhausted {
        base: Slug,
        attempts: u32,
        compensation: CompensationReport,
    },

    #[error("profile creation failed: {source} (rollback: {compensation})")]
    ProfileCreationFailed {
        source: StoreError,
        compensation: CompensationReport,
    },

    #[error("role creation failed: {source} (rollback: {compensation})")]
    RoleCreationFailed {
        source: StoreError,
        compensation: CompensationReport,
    },
}

impl ProvisioningError {
    /// The rollback outcome, for failures after the identity was created.
    #[must_use]
    pub const fn compensation(&self) -> Option<&CompensationReport> {
        match self {
            Self::SlugExhausted { compensation, .. }
            | Self::ProfileCreationFailed { compensation, .. }
            | Self::RoleCreationFailed { compensation, .. } => Some(compensation),
            Self::Invalid(_) | Self::DuplicateEmail | Self::IdentityCreationFailed(_) => None,
        }
    }
}

// =============================================================================
// Saga
// =============================================================================

/// Undo actions recorded so far, newest last.
struct Rollback<'a> {
    stores: &'a Stores,
    pending: Vec<Compensation>,
}

impl<'a> Rollback<'a> {
    const fn new(stores: &'a Stores) -> Self {
        Self {
            stores,
            pending: Vec::new(),
        }
    }

    fn record(&mut self, compensation: Compensation) {
        self.pending.push(compensation);
    }

    /// Run recorded undos newest first. Failures are logged, never propagated.
    async fn run(self) -> CompensationReport {
        let mut report = CompensationReport::default();

        for action in self.pending.into_iter().rev() {
            let result = match action {
                Compensation::DeleteProfile(id) => self.stores.profiles.delete(id).await,
                Compensation::DeleteIdentity(id) => {
                    self.stores.credentials.delete_identity(id).await
                }
            };

            match &result {
                Ok(()) => info!(%action, "Compensation applied"),
                Err(e) => error!(%action, error = %e, "Compensation failed, manual cleanup required"),
            }
            report.steps.push(CompensationStep { action, result });
        }

        report
    }
}

/// Outcome of the profile step.
enum ProfileInsert {
    Created(Profile),
    Existing(Profile),
    SlugTaken,
}

/// Runs the signup saga.
#[derive(Clone)]
pub struct ProvisioningService {
    stores: Stores,
    slugs: SlugAllocator,
}

impl ProvisioningService {
    #[must_use]
    pub fn new(stores: Stores, slug_max_attempts: u32) -> Self {
        let slugs = SlugAllocator::new(Arc::clone(&stores.profiles), slug_max_attempts);
        Self { stores, slugs }
    }

    /// Create identity, profile and role for a new account, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `ProvisioningError` describing the failed step. For failures
    /// after the identity exists the error carries the rollback outcome.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn provision(
        &self,
        request: SignupRequest,
    ) -> Result<ProvisionedAccount, ProvisioningError> {
        let (email, metadata) = validate(&request)?;
        let mut rollback = Rollback::new(&self.stores);

        // Step 1: identity
        let account_id = match self
            .stores
            .credentials
            .create_identity(&email, request.password.expose_secret(), &metadata)
            .await
        {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => return Err(ProvisioningError::DuplicateEmail),
            Err(e) => {
                warn!(error = %e, "Identity creation failed");
                return Err(ProvisioningError::IdentityCreationFailed(e));
            }
        };
        rollback.record(Compensation::DeleteIdentity(account_id));

        // Steps 2 and 3: slug and profile. Another signup can take the slug
        // between the lookup and the insert; resume at the next candidate.
        let base = slugify(&slug_base_name(&metadata, &email)).unwrap_or_else(Slug::fallback);
        let mut new_profile = NewProfile::free(account_id, base.clone(), email, metadata);
        let mut first_attempt = 0;
        let profile = loop {
            let (slug, attempt) = match self.slugs.allocate(&base, first_attempt).await {
                Ok(allocated) => allocated,
                Err(SlugAllocationError::Exhausted { base, attempts }) => {
                    warn!(%account_id, %base, attempts, "Slug space exhausted");
                    let compensation = rollback.run().await;
                    return Err(ProvisioningError::SlugExhausted {
                        base,
                        attempts,
                        compensation,
                    });
                }
                Err(SlugAllocationError::Store(source)) => {
                    warn!(%account_id, error = %source, "Slug lookup failed");
                    let compensation = rollback.run().await;
                    return Err(ProvisioningError::ProfileCreationFailed {
                        source,
                        compensation,
                    });
                }
            };
            new_profile.slug = slug;

            match self.ensure_profile(&new_profile).await {
                Ok(ProfileInsert::Created(profile)) => {
                    rollback.record(Compensation::DeleteProfile(account_id));
                    break profile;
                }
                Ok(ProfileInsert::Existing(profile)) => break profile,
                Ok(ProfileInsert::SlugTaken) => {
                    debug!(
                        %account_id,
                        slug = %new_profile.slug,
                        "Slug taken concurrently, retrying"
                    );
                    first_attempt = attempt + 1;
                }
                Err(source) => {
                    warn!(%account_id, error = %source, "Profile creation failed");
                    let compensation = rollback.run().await;
                    return Err(ProvisioningError::ProfileCreationFailed {
                        source,
                        compensation,
                    });
                }
            }
        };

        // Step 4: role
        let role = match self.ensure_role(account_id).await {
            Ok(role) => role,
            Err(source) => {
                warn!(%account_id, error = %source, "Role creation failed");
                let compensation = rollback.run().await;
                return Err(ProvisioningError::RoleCreationFailed {
                    source,
                    compensation,
                });
            }
        };

        info!(%account_id, slug = %profile.slug, %role, "Account provisioned");
        Ok(ProvisionedAccount {
            account_id,
            profile,
            role,
        })
    }

    /// Insert the profile unless one already exists for the account.
    async fn ensure_profile(&self, profile: &NewProfile) -> Result<ProfileInsert, StoreError> {
        if let Some(existing) = self.stores.profiles.find_by_id(profile.id).await? {
            warn!(account_id = %profile.id, "Profile already exists, reusing");
            return Ok(ProfileInsert::Existing(existing));
        }
        match self.stores.profiles.insert(profile).await {
            Ok(created) => Ok(ProfileInsert::Created(created)),
            Err(StoreError::Conflict(_)) => {
                // Either the id or the slug is taken; only the id is checkable.
                match self.stores.profiles.find_by_id(profile.id).await? {
                    Some(existing) => Ok(ProfileInsert::Existing(existing)),
                    None => Ok(ProfileInsert::SlugTaken),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_role(&self, account_id: AccountId) -> Result<AccountRole, StoreError> {
        if let Some(role) = self.stores.roles.find(account_id).await? {
            return Ok(role);
        }
        self.stores.roles.insert(account_id, AccountRole::Agent).await?;
        Ok(AccountRole::Agent)
    }
}

/// Check signup input, returning the parsed email and trimmed metadata.
fn validate(
    request: &SignupRequest,
) -> Result<(Email, AccountMetadata), SignupValidationError> {
    let email = Email::parse(&request.email)?;

    if request.password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SignupValidationError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }

    let first_name = request.metadata.first_name.trim();
    let last_name = request.metadata.last_name.trim();
    if first_name.is_empty() {
        return Err(SignupValidationError::MissingFirstName);
    }
    if last_name.is_empty() {
        return Err(SignupValidationError::MissingLastName);
    }

    let metadata = AccountMetadata {
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        phone: non_blank(request.metadata.phone.as_deref()),
        company: non_blank(request.metadata.company.as_deref()),
    };
    Ok((email, metadata))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

/// `"{first} {last}"`, or the email local part when the name has nothing
/// slug-worthy in it.
fn slug_base_name(metadata: &AccountMetadata, email: &Email) -> String {
    let display_name = metadata.display_name();
    if slugify(&display_name).is_some() {
        display_name
    } else {
        email.local_part().to_owned()
    }
}
