//! GnuPG-backed key directory.
//!
//! Parses `gpg --with-colons --list-keys` output. Field layout (1-based):
//! 1 record type, 2 validity, 10 fingerprint / user id, 12 capabilities.
//! The first `fpr` record after a `pub` and before any `sub` belongs to the
//! primary key.
//!
//! Only key state filters a key out: invalid (`i`), revoked, expired or
//! disabled. Calculated trust (`-`, `q`, `n`, `m`, `f`, `u`) is left alone;
//! gpg itself decides at encryption time whether an untrusted key may be
//! used and reports that on stderr.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{Identity, IdentityError, KeyDirectory, KeyValidity, PublicKeyRecord};
use crate::process;

/// Key directory that queries a local GnuPG keyring.
#[derive(Debug, Clone)]
pub struct GnupgKeyDirectory {
    program: PathBuf,
}

impl GnupgKeyDirectory {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl KeyDirectory for GnupgKeyDirectory {
    async fn list_keys(&self, pattern: &str) -> Result<Vec<PublicKeyRecord>, IdentityError> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--batch",
            "--with-colons",
            "--fixed-list-mode",
            "--list-keys",
            "--",
            pattern,
        ]);

        let output = process::run(cmd).await.map_err(|e| {
            IdentityError::Directory(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        let listing = String::from_utf8_lossy(&output.stdout);
        let records = parse_colon_listing(&listing);

        // gpg exits non-zero when nothing matches; only an empty listing
        // tells us whether that is "no key" or a real failure.
        if !output.status.success() && records.is_empty() {
            debug!(
                pattern,
                status = %output.status,
                stderr = %process::diagnostics(&output),
                "gpg found no matching key"
            );
        }

        Ok(records)
    }
}

/// Parse a `--with-colons` key listing into one record per `pub` entry.
pub fn parse_colon_listing(listing: &str) -> Vec<PublicKeyRecord> {
    let mut records = Vec::new();
    let mut current: Option<PublicKeyRecord> = None;
    let mut in_primary = false;

    for line in listing.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or("");

        match field(0) {
            "pub" => {
                records.extend(current.take());
                current = Some(PublicKeyRecord {
                    fingerprint: None,
                    validity: validity_of(field(1), field(11)),
                    user_ids: Vec::new(),
                });
                in_primary = true;
            }
            "fpr" if in_primary => {
                if let Some(record) = current.as_mut() {
                    if record.fingerprint.is_none() {
                        record.fingerprint = Identity::from_fingerprint(field(9)).ok();
                    }
                }
            }
            "uid" => {
                if let Some(record) = current.as_mut() {
                    record.user_ids.push(field(9).to_string());
                }
            }
            "sub" | "ssb" => in_primary = false,
            other => trace!(record = other, "ignoring colon record"),
        }
    }

    records.extend(current);
    records
}

fn validity_of(validity: &str, capabilities: &str) -> KeyValidity {
    if capabilities.contains('D') {
        return KeyValidity::Disabled;
    }
    match validity {
        "r" => KeyValidity::Revoked,
        "e" => KeyValidity::Expired,
        "i" => KeyValidity::Invalid,
        "d" => KeyValidity::Disabled,
        _ => KeyValidity::Usable,
    }
}
