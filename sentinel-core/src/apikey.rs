// sentinel-core/src/apikey.rs
// ============================================================================
// Module: Sentinel API Keys
// Description: Bearer API key generation, hashing, and constant-time
// verification.
// Purpose: Back the `Authorization: Bearer al_<live|test>_<32 chars>` scheme
// described in §6 "Auth" without ever persisting or logging the raw key.
// Dependencies: crate::{ids, time}, rand, sha2, subtle
// ============================================================================

//! ## Overview
//! A raw API key is only ever held in memory on the path from generation to
//! the caller, and on the path from the `Authorization` header to
//! [`verify`]. Everything persisted (`ApiKeyRecord`) carries only the
//! 16-character prefix (for fast lookup) and a SHA-256 hash (for
//! verification), matching §3 "API key".

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::hashing::hex_encode;
use crate::ids::ApiKeyId;
use crate::ids::TenantId;
use crate::time::Instant;

// ============================================================================
// SECTION: Environment / Scope
// ============================================================================

/// Environment a key was minted for (§3 "API key").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEnvironment {
    /// Production traffic.
    Production,
    /// Staging traffic.
    Staging,
    /// Automated test traffic.
    Test,
    /// Local development traffic.
    Development,
}

impl KeyEnvironment {
    const fn key_scheme(self) -> &'static str {
        match self {
            Self::Production => "live",
            Self::Staging | Self::Test | Self::Development => "test",
        }
    }
}

// ============================================================================
// SECTION: Raw Key Generation
// ============================================================================

const RAW_SUFFIX_LEN: usize = 32;
const URL_SAFE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A freshly minted bearer key. The `secret` field is the only copy of the
/// raw key that will ever exist outside the caller who requested it; only
/// `prefix` and the hash of `secret` are meant to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedKey {
    /// The full bearer string, e.g. `al_live_<32 chars>`.
    pub secret: String,
    /// The first 16 characters of `secret`, safe to store and display.
    pub prefix: String,
}

/// Mints a new bearer key of the form `al_{live|test}_<32 url-safe chars>`.
#[must_use]
pub fn mint(environment: KeyEnvironment) -> MintedKey {
    let mut rng = rand::thread_rng();
    let mut suffix = String::with_capacity(RAW_SUFFIX_LEN);
    for _ in 0..RAW_SUFFIX_LEN {
        let index = (rng.next_u32() as usize) % URL_SAFE_ALPHABET.len();
        suffix.push(URL_SAFE_ALPHABET[index] as char);
    }
    let secret = format!("al_{}_{}", environment.key_scheme(), suffix);
    let prefix = secret.chars().take(16).collect();
    MintedKey { secret, prefix }
}

/// Hashes a raw key with SHA-256 for storage.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Compares a presented raw key against a stored hash in constant time,
/// matching the authentication discipline in §6 ("Auth").
#[must_use]
pub fn verify(presented_secret: &str, stored_hash: &str) -> bool {
    let presented_hash = hash_secret(presented_secret);
    let presented_bytes = presented_hash.as_bytes();
    let stored_bytes = stored_hash.as_bytes();
    if presented_bytes.len() != stored_bytes.len() {
        return false;
    }
    presented_bytes.ct_eq(stored_bytes).into()
}

// ============================================================================
// SECTION: Persisted Record
// ============================================================================

/// The persisted form of an API key (§3 "API key"). Never carries the raw
/// secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// API key identifier.
    pub id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Visible 16-character prefix.
    pub prefix: String,
    /// SHA-256 hash of the raw secret.
    pub secret_hash: String,
    /// Human-readable name for the key.
    pub name: String,
    /// Scopes granted to the key.
    pub scopes: Vec<String>,
    /// Environment the key was minted for.
    pub environment: KeyEnvironment,
    /// Creation instant.
    pub created_at: Instant,
    /// Last successful use, if any.
    pub last_used_at: Option<Instant>,
    /// Revocation instant, if revoked.
    pub revoked_at: Option<Instant>,
}

impl ApiKeyRecord {
    /// True when the key has been revoked.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_key_has_expected_shape() {
        let minted = mint(KeyEnvironment::Production);
        assert!(minted.secret.starts_with("al_live_"));
        assert_eq!(minted.secret.len(), "al_live_".len() + RAW_SUFFIX_LEN);
        assert_eq!(minted.prefix.len(), 16);
    }

    #[test]
    fn development_keys_use_test_scheme() {
        let minted = mint(KeyEnvironment::Development);
        assert!(minted.secret.starts_with("al_test_"));
    }

    #[test]
    fn verify_accepts_the_matching_secret() {
        let minted = mint(KeyEnvironment::Test);
        let hash = hash_secret(&minted.secret);
        assert!(verify(&minted.secret, &hash));
    }

    #[test]
    fn verify_rejects_a_tampered_secret() {
        let minted = mint(KeyEnvironment::Test);
        let hash = hash_secret(&minted.secret);
        let mut tampered = minted.secret.clone();
        tampered.push('x');
        assert!(!verify(&tampered, &hash));
    }

    #[test]
    fn revoked_key_reports_revoked() {
        let record = ApiKeyRecord {
            id: ApiKeyId::new("k1"),
            tenant_id: TenantId::new("acme"),
            prefix: "al_live_AAAAAAAA".to_string(),
            secret_hash: "deadbeef".to_string(),
            name: "ci".to_string(),
            scopes: vec!["events:write".to_string()],
            environment: KeyEnvironment::Production,
            created_at: Instant::now(),
            last_used_at: None,
            revoked_at: Some(Instant::now()),
        };
        assert!(record.is_revoked());
    }
}
