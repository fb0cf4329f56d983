//! Session store: process-wide map from opaque token to authenticated
//! identity. Tokens live until explicit revocation or process exit; there is
//! deliberately no expiry.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

const TOKEN_BYTES: usize = 32;

fn is_false(value: &bool) -> bool {
    !*value
}

/// The subset of a directory record exposed to clients and sessions.
///
/// `admin` appears on the wire only when true; clients key off the presence
/// of the field rather than its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub admin: bool,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Identity>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Issues a fresh token for `identity` and stores the mapping.
    pub async fn create(&self, identity: Identity) -> String {
        let token = Self::generate_token();
        self.sessions
            .write()
            .await
            .insert(token.clone(), identity);
        token
    }

    pub async fn lookup(&self, token: &str) -> Option<Identity> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Removes the session for `token`. Returns whether a session existed;
    /// revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) -> bool {
        let revoked = self.sessions.write().await.remove(token).is_some();
        if revoked {
            debug!("session revoked");
        }
        revoked
    }

    /// Snapshots of every live session, in no particular order. Admin-only
    /// at the gateway surface.
    pub async fn list_all(&self) -> Vec<Identity> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
