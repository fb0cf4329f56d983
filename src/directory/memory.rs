use std::collections::HashSet;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::{Directory, NewUser, UserRecord};
use crate::error::DirectoryError;

/// Volatile directory backing store. Registration allowlist is fixed at
/// construction; records last until process exit.
pub struct InMemoryDirectory {
    users: RwLock<Vec<UserRecord>>,
    allowlist: HashSet<String>,
}

impl InMemoryDirectory {
    pub fn new(allowlist: impl IntoIterator<Item = String>) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            allowlist: allowlist.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

fn hash_password(password: &str) -> Result<String, DirectoryError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DirectoryError::Hash(e.to_string()))
}

fn verify_hash(hash: &str, password: &str) -> Result<bool, DirectoryError> {
    let parsed = PasswordHash::new(hash).map_err(|e| DirectoryError::Hash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DirectoryError::Hash(e.to_string())),
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let email = email.map(str::to_lowercase);
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| {
                username.is_some_and(|name| u.username == name)
                    || email.as_deref().is_some_and(|mail| u.email == mail)
            })
            .cloned())
    }

    async fn verify_password(
        &self,
        record: &UserRecord,
        password: &str,
    ) -> Result<bool, DirectoryError> {
        let hash = record.password_hash.clone();
        let password = password.to_owned();
        // Argon2 verification is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || verify_hash(&hash, &password))
            .await
            .map_err(|e| DirectoryError::Hash(e.to_string()))?
    }

    async fn is_allowlisted(&self, email: &str) -> Result<bool, DirectoryError> {
        Ok(self.allowlist.contains(&email.to_lowercase()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, DirectoryError> {
        let password = new_user.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| DirectoryError::Hash(e.to_string()))??;

        let record = UserRecord {
            username: new_user.username,
            email: new_user.email.to_lowercase(),
            password_hash,
            color: new_user.color,
            admin: new_user.admin,
        };

        let mut users = self.users.write().await;
        // Re-check under the write lock; the gateway's earlier existence
        // check can race a concurrent registration.
        if users
            .iter()
            .any(|u| u.username == record.username || u.email == record.email)
        {
            return Err(DirectoryError::Duplicate);
        }
        users.push(record.clone());
        info!("directory record created for {}", record.username);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            color: "#336699".to_string(),
            admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let dir = InMemoryDirectory::new(vec!["alice@example.com".to_string()]);
        dir.create_user(new_user("alice", "Alice@Example.com", "hunter2"))
            .await
            .unwrap();

        let by_name = dir
            .find_by_username_or_email(Some("alice"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.email, "alice@example.com");

        // email lookup is case-insensitive
        let by_email = dir
            .find_by_username_or_email(None, Some("ALICE@EXAMPLE.COM"))
            .await
            .unwrap();
        assert!(by_email.is_some());

        let miss = dir
            .find_by_username_or_email(Some("bob"), Some("bob@example.com"))
            .await
            .unwrap();
        assert!(miss.is_none());

        let neither = dir.find_by_username_or_email(None, None).await.unwrap();
        assert!(neither.is_none());
    }

    #[tokio::test]
    async fn test_password_verification() {
        let dir = InMemoryDirectory::new(Vec::new());
        let record = dir
            .create_user(new_user("alice", "alice@example.com", "hunter2"))
            .await
            .unwrap();

        assert_ne!(record.password_hash, "hunter2");
        assert!(dir.verify_password(&record, "hunter2").await.unwrap());
        assert!(!dir.verify_password(&record, "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let dir = InMemoryDirectory::new(Vec::new());
        dir.create_user(new_user("alice", "alice@example.com", "pw"))
            .await
            .unwrap();

        let same_name = dir
            .create_user(new_user("alice", "other@example.com", "pw"))
            .await;
        assert!(matches!(same_name, Err(DirectoryError::Duplicate)));

        let same_email = dir
            .create_user(new_user("other", "alice@example.com", "pw"))
            .await;
        assert!(matches!(same_email, Err(DirectoryError::Duplicate)));

        assert_eq!(dir.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_allowlist_is_case_insensitive() {
        let dir = InMemoryDirectory::new(vec!["Friend@Example.com".to_string()]);
        assert!(dir.is_allowlisted("friend@example.com").await.unwrap());
        assert!(dir.is_allowlisted("FRIEND@EXAMPLE.COM").await.unwrap());
        assert!(!dir.is_allowlisted("stranger@example.com").await.unwrap());
    }
}
