//! Identity resolution
//!
//! Maps a human-chosen nickname onto exactly one OpenPGP key fingerprint held
//! in the local trust store. The store itself is external: keys are created,
//! signed and revoked with the usual tooling, and every lookup goes back to it
//! so a revocation takes effect on the next invocation.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

mod gnupg;

pub use gnupg::{parse_colon_listing, GnupgKeyDirectory};

/// Identity resolution errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("No GPG public key found for '{0}'")]
    NotFound(String),

    #[error("{count} usable GPG public keys match '{pattern}'; expected exactly one")]
    Ambiguous { pattern: String, count: usize },

    #[error("Invalid key fingerprint: {0:?}")]
    InvalidFingerprint(String),

    #[error("Key store query failed: {0}")]
    Directory(String),
}

/// A key fingerprint, normalised to upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Parse a hex fingerprint (or long key id). Case is ignored.
    pub fn from_fingerprint(fingerprint: &str) -> Result<Self, IdentityError> {
        let trimmed = fingerprint.trim();
        let valid = (16..=64).contains(&trimmed.len())
            && trimmed.len() % 2 == 0
            && trimmed.bytes().all(|b| b.is_ascii_hexdigit());

        if !valid {
            return Err(IdentityError::InvalidFingerprint(fingerprint.to_string()));
        }
        Ok(Identity(trimmed.to_ascii_uppercase()))
    }

    pub fn fingerprint(&self) -> &str {
        &self.0
    }

    /// Compare against a raw fingerprint as reported by an external tool.
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw.trim())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validity of a public key as reported by the trust store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValidity {
    Usable,
    Revoked,
    Expired,
    Invalid,
    Disabled,
}

/// One public key entry returned by a [`KeyDirectory`] query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    /// Primary key fingerprint; `None` when the store gave no usable one
    pub fingerprint: Option<Identity>,
    pub validity: KeyValidity,
    pub user_ids: Vec<String>,
}

impl PublicKeyRecord {
    pub fn is_usable(&self) -> bool {
        self.validity == KeyValidity::Usable
    }
}

/// Read-only view of the external trust store.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// All public keys whose metadata matches `pattern`.
    async fn list_keys(&self, pattern: &str) -> Result<Vec<PublicKeyRecord>, IdentityError>;
}

/// Resolves nicknames to a single identity.
#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn KeyDirectory>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn KeyDirectory>) -> Self {
        Self { directory }
    }

    /// Exactly one usable key must match `pattern`.
    pub async fn resolve(&self, pattern: &str) -> Result<Identity, IdentityError> {
        // An empty pattern would match the whole keyring.
        if pattern.trim().is_empty() {
            return Err(IdentityError::NotFound(pattern.to_string()));
        }

        let records = self.directory.list_keys(pattern).await?;
        let usable: Vec<&PublicKeyRecord> = records.iter().filter(|r| r.is_usable()).collect();

        debug!(
            pattern,
            matched = records.len(),
            usable = usable.len(),
            "queried key store"
        );

        match usable.as_slice() {
            [] => Err(IdentityError::NotFound(pattern.to_string())),
            [only] => only
                .fingerprint
                .clone()
                .ok_or_else(|| IdentityError::NotFound(pattern.to_string())),
            many => Err(IdentityError::Ambiguous {
                pattern: pattern.to_string(),
                count: many.len(),
            }),
        }
    }
}
