//! Broker credential encryption at rest.
//!
//! Broker credentials live per-user, per-broker-connection rather than as a
//! single set of process-wide env vars, so unlike a global secrets resolver
//! this module encrypts/decrypts individual credential bundles on demand
//! under one master key loaded once at startup. `Debug` on every type here
//! redacts its payload; error messages never include key material.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{anyhow, bail, Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use sfp_types::session::EncryptedCredentials;

const NONCE_LEN: usize = 12;

/// A broker credential bundle before encryption. Fields are broker-specific
/// strings (API key, API secret, access token, ...); callers decide the
/// shape per `broker_type`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub fields: std::collections::BTreeMap<String, String>,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field(
                "fields",
                &self
                    .fields
                    .keys()
                    .map(|k| (k.clone(), "<REDACTED>"))
                    .collect::<std::collections::BTreeMap<_, _>>(),
            )
            .finish()
    }
}

/// The master key used to seal/open `CredentialBundle`s, read once from
/// `SFP_CREDENTIALS_MASTER_KEY` (32 raw bytes, hex-encoded) at startup.
pub struct MasterKey {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").field("cipher", &"<REDACTED>").finish()
    }
}

impl MasterKey {
    /// Load from the given hex-encoded 32-byte value. Returns an error
    /// naming the env var on a bad length, never the value itself.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let raw = hex::decode(hex_key.trim()).context("SFP_CREDENTIALS_MASTER_KEY is not valid hex")?;
        if raw.len() != 32 {
            bail!(
                "SFP_CREDENTIALS_MASTER_KEY must decode to 32 bytes, got {}",
                raw.len()
            );
        }
        let key = Key::<Aes256Gcm>::from_slice(&raw);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Load from the environment. Fails hard (no silent fallback to an
    /// unencrypted mode) if the variable is absent or malformed.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("SFP_CREDENTIALS_MASTER_KEY")
            .context("SFP_CREDENTIALS_MASTER_KEY is not set")?;
        Self::from_hex(&raw)
    }

    /// Encrypt a credential bundle. The nonce is random per call and
    /// prefixed to the ciphertext so decryption is self-contained.
    pub fn seal(&self, bundle: &CredentialBundle) -> Result<EncryptedCredentials> {
        let plaintext = serde_json::to_vec(bundle).context("credential bundle serialization failed")?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| anyhow!("credential encryption failed"))?;

        let mut out = nonce_bytes.to_vec();
        out.append(&mut ciphertext);
        Ok(EncryptedCredentials { ciphertext: out })
    }

    /// Decrypt a previously sealed bundle.
    pub fn open(&self, encrypted: &EncryptedCredentials) -> Result<CredentialBundle> {
        if encrypted.ciphertext.len() < NONCE_LEN {
            bail!("encrypted credential blob is shorter than a nonce");
        }
        let (nonce_bytes, ct) = encrypted.ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ct)
            .map_err(|_| anyhow!("credential decryption failed: bad key or corrupted blob"))?;

        serde_json::from_slice(&plaintext).context("decrypted credential bundle is not valid json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> MasterKey {
        MasterKey::from_hex(&"ab".repeat(32)).unwrap()
    }

    fn sample_bundle() -> CredentialBundle {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("api_key".to_string(), "k_live_123".to_string());
        fields.insert("api_secret".to_string(), "s_live_456".to_string());
        CredentialBundle { fields }
    }

    #[test]
    fn round_trips_through_seal_and_open() {
        let key = test_key();
        let bundle = sample_bundle();
        let sealed = key.seal(&bundle).unwrap();
        let opened = key.open(&sealed).unwrap();
        assert_eq!(opened.fields, bundle.fields);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let key_a = test_key();
        let key_b = MasterKey::from_hex(&"cd".repeat(32)).unwrap();
        let sealed = key_a.seal(&sample_bundle()).unwrap();
        assert!(key_b.open(&sealed).is_err());
    }

    #[test]
    fn rejects_key_of_wrong_length() {
        assert!(MasterKey::from_hex("abcd").is_err());
    }

    #[test]
    fn debug_output_redacts_fields() {
        let bundle = sample_bundle();
        let rendered = format!("{bundle:?}");
        assert!(!rendered.contains("k_live_123"));
        assert!(!rendered.contains("s_live_456"));
    }

    #[test]
    fn two_seals_of_same_bundle_differ() {
        let key = test_key();
        let bundle = sample_bundle();
        let a = key.seal(&bundle).unwrap();
        let b = key.seal(&bundle).unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
