//! Broker Session — per user×broker-credential lifecycle state.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionHealth {
    Healthy,
    Degraded,
    Error,
    Expired,
}

/// Encrypted-at-rest broker credentials. `Debug` redacts the ciphertext so
/// logging a `Session` never leaks secret material.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptedCredentials {
    /// Nonce-prefixed AES-256-GCM ciphertext of the JSON-encoded secret bundle.
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Debug for EncryptedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedCredentials")
            .field("ciphertext", &"<REDACTED>")
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub credential_id: String,
    pub broker_type: String,
    pub credentials: EncryptedCredentials,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub last_activity_millis: i64,
    pub error_count: u32,
    pub health: SessionHealth,
}

impl Session {
    /// `true` once `inactive_ttl_ms` has elapsed since `last_activity_millis`
    /// (default 8h).
    pub fn is_expired(&self, now_millis: i64, inactive_ttl_ms: i64) -> bool {
        now_millis.saturating_sub(self.last_activity_millis) >= inactive_ttl_ms
    }
}
