//! Error types for the exchange flows

use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::identity::IdentityError;
use crate::mailbox::MailboxError;
use crate::registry::RegistryError;

/// Result type for exchange operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Component failures, passed through unchanged.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure taxonomy callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    AmbiguousIdentity,
    DuplicateNickname,
    CryptoFailure,
    SignatureMissing,
    SignerMismatch,
    DecryptFailure,
    PublishFailure,
    FetchFailure,
    Registry,
    Config,
}

impl FailureKind {
    /// Whether the failure means the envelope may be forged.
    pub fn is_authenticity_failure(self) -> bool {
        matches!(self, FailureKind::SignatureMissing | FailureKind::SignerMismatch)
    }
}

impl ExchangeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExchangeError::Identity(IdentityError::NotFound(_)) => FailureKind::NotFound,
            ExchangeError::Identity(IdentityError::Ambiguous { .. }) => {
                FailureKind::AmbiguousIdentity
            }
            ExchangeError::Identity(IdentityError::InvalidFingerprint(_))
            | ExchangeError::Identity(IdentityError::Directory(_)) => FailureKind::CryptoFailure,
            ExchangeError::Crypto(CryptoError::Encrypt(_))
            | ExchangeError::Crypto(CryptoError::Unavailable(_)) => FailureKind::CryptoFailure,
            ExchangeError::Crypto(CryptoError::SignatureMissing)
            | ExchangeError::Crypto(CryptoError::UnverifiedSignature(_)) => {
                FailureKind::SignatureMissing
            }
            ExchangeError::Crypto(CryptoError::SignerMismatch { .. }) => {
                FailureKind::SignerMismatch
            }
            ExchangeError::Crypto(CryptoError::Decrypt(_)) => FailureKind::DecryptFailure,
            ExchangeError::Mailbox(MailboxError::Publish { .. }) => FailureKind::PublishFailure,
            ExchangeError::Mailbox(MailboxError::Fetch { .. }) => FailureKind::FetchFailure,
            ExchangeError::Registry(RegistryError::NotFound(_)) => FailureKind::NotFound,
            ExchangeError::Registry(RegistryError::DuplicateNickname(_)) => {
                FailureKind::DuplicateNickname
            }
            ExchangeError::Registry(_) => FailureKind::Registry,
            ExchangeError::Config(_) => FailureKind::Config,
        }
    }
}
