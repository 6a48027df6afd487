//! Sign-then-encrypt and decrypt-then-verify.
//!
//! [`CryptoEngine::open_inbound`] is the only way to obtain plaintext, and it
//! returns it only after the signer check has passed. Callers never see bytes
//! from an envelope that was merely decryptable.

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::Identity;

mod gnupg;
mod status;

pub use gnupg::GnupgEngine;
pub use status::{DecryptionReport, ValidSignature};

/// Crypto engine errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The engine refused to sign and encrypt; carries its diagnostics.
    #[error("Unable to encrypt message\n{0}")]
    Encrypt(String),

    /// Decrypted, but nothing vouched for the content.
    #[error("Unable to verify signature (no valid signature found)")]
    SignatureMissing,

    /// A valid signature sits next to one gpg could not check.
    #[error("Unable to verify signature ({0} signature(s) could not be checked)")]
    UnverifiedSignature(usize),

    /// Decrypted and validly signed, by somebody else.
    #[error("Signature valid but from different sender (expected {expected}, signed by {actual})")]
    SignerMismatch { expected: String, actual: String },

    #[error("Unable to decrypt message\n{0}")]
    Decrypt(String),

    #[error("'{0}' not found")]
    Unavailable(String),
}

/// Cryptographic capability used by the exchange flows.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Sign with the local default key and encrypt for `recipient`.
    /// Returns ASCII-armored ciphertext.
    async fn seal_outbound(
        &self,
        plaintext: &[u8],
        recipient: &Identity,
    ) -> Result<String, CryptoError>;

    /// Decrypt with local private keys and require every valid signature to
    /// come from `expected_signer`.
    async fn open_inbound(
        &self,
        ciphertext: &[u8],
        expected_signer: &Identity,
    ) -> Result<Vec<u8>, CryptoError>;
}
