//! Directory Adapter: the external user-record collaborator. The relay core
//! only depends on this trait; record storage and password hashing policy
//! live behind it.

mod memory;

pub use memory::InMemoryDirectory;

use async_trait::async_trait;
use rand::Rng;

use crate::error::DirectoryError;
use crate::session::Identity;

/// A directory-owned user record. Never mutated by the core.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub color: String,
    pub admin: bool,
}

impl UserRecord {
    /// The snapshot exposed to clients and sessions (everything except the
    /// password hash).
    pub fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            email: self.email.clone(),
            color: self.color.clone(),
            admin: self.admin,
        }
    }
}

/// Input for [`Directory::create_user`]. The password is plaintext here; the
/// directory hashes it before storing anything.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub color: String,
    pub admin: bool,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Finds a record by exact username or case-insensitive email. Either
    /// identifier may be absent; with both absent the result is `None`.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    async fn verify_password(
        &self,
        record: &UserRecord,
        password: &str,
    ) -> Result<bool, DirectoryError>;

    /// Whether `email` may register at all.
    async fn is_allowlisted(&self, email: &str) -> Result<bool, DirectoryError>;

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, DirectoryError>;
}

/// Random display color assigned at registration.
pub fn random_color() -> String {
    format!("#{:06x}", rand::thread_rng().gen_range(0u32..=0xff_ffff))
}
