//! Credential store backed by `auth.identity`.
//!
//! Passwords are hashed with Argon2id before they reach the database.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use listing_portal_core::stores::{CredentialStore, StoreResult};
use listing_portal_core::{AccountId, AccountMetadata, Email};

use super::RepositoryError;

/// `PostgreSQL` implementation of [`CredentialStore`].
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new credential store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_identity(
        &self,
        email: &Email,
        password: &str,
        metadata: &AccountMetadata,
    ) -> Result<AccountId, RepositoryError> {
        let id = AccountId::generate();
        let password_hash = hash_password(password)?;

        sqlx::query(
            r"
            INSERT INTO auth.identity (id, email, password_hash, metadata)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(Json(metadata))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "email already registered"))?;

        Ok(id)
    }

    async fn password_hash_for(
        &self,
        email: &Email,
    ) -> Result<Option<(AccountId, String)>, RepositoryError> {
        let row: Option<(AccountId, String)> =
            sqlx::query_as("SELECT id, password_hash FROM auth.identity WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
        metadata: &AccountMetadata,
    ) -> StoreResult<AccountId> {
        Ok(self.insert_identity(email, password, metadata).await?)
    }

    async fn delete_identity(&self, id: AccountId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM auth.identity WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound.into());
        }
        Ok(())
    }

    async fn verify_password(
        &self,
        email: &Email,
        password: &str,
    ) -> StoreResult<Option<AccountId>> {
        let Some((id, hash)) = self.password_hash_for(email).await? else {
            return Ok(None);
        };
        Ok(password_matches(password, &hash)?.then_some(id))
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, RepositoryError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RepositoryError::DataCorruption(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash.
fn password_matches(password: &str, hash: &str) -> Result<bool, RepositoryError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(password_matches("correct horse", &hash).unwrap());
        assert!(!password_matches("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_corruption() {
        assert!(matches!(
            password_matches("pw", "not-a-hash"),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
