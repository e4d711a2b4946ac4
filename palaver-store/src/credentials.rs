//! Credential storage and verification

use crate::storage_error;
use chrono::Utc;
use palaver_core::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::debug;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Owns user records: username plus a one-way password digest. The
/// plaintext password is never stored.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user row. Fails with [`Error::DuplicateUser`] when the
    /// username is taken.
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        if username.trim().is_empty() {
            return Err(Error::Validation("username must not be empty".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters long"
            )));
        }

        let result = sqlx::query(
            "INSERT INTO users (username, password_digest, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(hash_password(password))
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(username, "registered new user");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(Error::DuplicateUser(username.to_string()))
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    /// Recompute the digest and compare against the stored one. Unknown
    /// usernames and wrong passwords both come back `false`; the two cases
    /// are never distinguished.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT password_digest FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        Ok(stored.is_some_and(|digest| digest == hash_password(password)))
    }
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let pool = crate::connect(path.to_str().unwrap()).await.unwrap();
        (dir, CredentialStore::new(pool))
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let (_dir, store) = open_store().await;

        store.register("alice", "longenough1").await.unwrap();
        assert!(store.verify("alice", "longenough1").await.unwrap());
        assert!(!store.verify("alice", "longenough2").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_verifies_false_not_error() {
        let (_dir, store) = open_store().await;
        assert!(!store.verify("nobody", "whatever123").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_dir, store) = open_store().await;

        store.register("bob", "password-one").await.unwrap();
        let err = store.register("bob", "password-two").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateUser(name) if name == "bob"));

        // The original credentials still work.
        assert!(store.verify("bob", "password-one").await.unwrap());
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_storage() {
        let (_dir, store) = open_store().await;

        let err = store.register("carol", "short").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!store.verify("carol", "short").await.unwrap());
    }
}
