//! Machine-readable status stream emitted by `gpg --status-file`.
//!
//! Only the keywords that decide whether plaintext may be released are kept.
//! Every status line starts with `[GNUPG:] ` followed by a keyword and its
//! space-separated arguments.

use tracing::{debug, warn};

use super::CryptoError;
use crate::identity::Identity;

const STATUS_PREFIX: &str = "[GNUPG:] ";

/// A signature that gpg reported as cryptographically valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignature {
    /// Fingerprint of the (sub)key that made the signature
    pub signing_key: String,
    /// Fingerprint of the corresponding primary key, when reported
    pub primary_key: Option<String>,
}

impl ValidSignature {
    /// The fingerprint that names the signer: the primary key when known.
    pub fn signer(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(&self.signing_key)
    }

    pub fn is_from(&self, identity: &Identity) -> bool {
        identity.matches(&self.signing_key)
            || self.primary_key.as_deref().is_some_and(|p| identity.matches(p))
    }
}

/// Outcome of a decrypt run, as far as the status stream tells it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptionReport {
    pub decryption_okay: bool,
    pub decryption_failed: bool,
    pub no_data: bool,
    pub valid_signatures: Vec<ValidSignature>,
    pub bad_signatures: usize,
}

impl DecryptionReport {
    pub fn parse(status: &str) -> Self {
        let mut report = DecryptionReport::default();

        for line in status.lines() {
            let Some(rest) = line.strip_prefix(STATUS_PREFIX) else {
                continue;
            };
            let mut words = rest.split_whitespace();
            match words.next() {
                Some("DECRYPTION_OKAY") => report.decryption_okay = true,
                Some("DECRYPTION_FAILED") => report.decryption_failed = true,
                Some("NODATA") => report.no_data = true,
                Some("BADSIG") | Some("ERRSIG") => report.bad_signatures += 1,
                Some("VALIDSIG") => {
                    let args: Vec<&str> = words.collect();
                    if let Some(signing_key) = args.first() {
                        report.valid_signatures.push(ValidSignature {
                            signing_key: signing_key.to_string(),
                            primary_key: args.get(9).map(|s| s.to_string()),
                        });
                    }
                }
                _ => {}
            }
        }

        report
    }

    /// Decide whether plaintext produced by this run may be released as a
    /// message from `expected`.
    ///
    /// Every signature must be valid and come from `expected`; one foreign
    /// or uncheckable signature is enough to reject the envelope.
    pub fn authorize(&self, expected: &Identity, diagnostics: &str) -> Result<(), CryptoError> {
        if self.decryption_failed || self.no_data || !self.decryption_okay {
            return Err(CryptoError::Decrypt(if diagnostics.is_empty() {
                "no successful decryption reported".to_string()
            } else {
                diagnostics.to_string()
            }));
        }

        if self.valid_signatures.is_empty() {
            warn!(
                bad_signatures = self.bad_signatures,
                "decrypted message carries no valid signature"
            );
            return Err(CryptoError::SignatureMissing);
        }

        if let Some(foreign) = self.valid_signatures.iter().find(|s| !s.is_from(expected)) {
            warn!(
                expected = %expected,
                actual = foreign.signer(),
                "message signed by unexpected key"
            );
            return Err(CryptoError::SignerMismatch {
                expected: expected.fingerprint().to_string(),
                actual: foreign.signer().to_string(),
            });
        }

        if self.bad_signatures > 0 {
            warn!(
                bad_signatures = self.bad_signatures,
                "valid signature accompanied by unverifiable ones"
            );
            return Err(CryptoError::UnverifiedSignature(self.bad_signatures));
        }

        debug!(
            signer = %expected,
            signatures = self.valid_signatures.len(),
            "signature verified"
        );
        Ok(())
    }
}
