//! GnuPG-backed crypto engine.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use super::{CryptoEngine, CryptoError, DecryptionReport};
use crate::identity::Identity;
use crate::process;

/// Shells out to `gpg` using the caller's default keyring and agent.
#[derive(Debug, Clone)]
pub struct GnupgEngine {
    program: PathBuf,
}

impl GnupgEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that the configured program can be executed at all.
    pub async fn ensure_available(program: &Path) -> Result<(), CryptoError> {
        let mut cmd = Command::new(program);
        cmd.arg("--version");
        match process::run(cmd).await {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(CryptoError::Unavailable(program.display().to_string())),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--yes"]);
        cmd
    }
}

#[async_trait]
impl CryptoEngine for GnupgEngine {
    async fn seal_outbound(
        &self,
        plaintext: &[u8],
        recipient: &Identity,
    ) -> Result<String, CryptoError> {
        let mut cmd = self.command();
        cmd.args(["--armor", "--sign", "--encrypt", "--recipient"])
            .arg(recipient.fingerprint());

        debug!(recipient = %recipient, bytes = plaintext.len(), "running gpg encrypt");
        let output = process::run_with_input(cmd, plaintext).await.map_err(|e| {
            CryptoError::Encrypt(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            return Err(CryptoError::Encrypt(process::diagnostics(&output)));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| CryptoError::Encrypt("gpg produced non-armored output".to_string()))
    }

    async fn open_inbound(
        &self,
        ciphertext: &[u8],
        expected_signer: &Identity,
    ) -> Result<Vec<u8>, CryptoError> {
        let status_file = tempfile::NamedTempFile::new()
            .map_err(|e| CryptoError::Decrypt(format!("cannot create status file: {}", e)))?;

        let mut cmd = self.command();
        cmd.arg("--status-file")
            .arg(status_file.path())
            .arg("--decrypt");

        debug!(expected = %expected_signer, bytes = ciphertext.len(), "running gpg decrypt");
        let output = process::run_with_input(cmd, ciphertext).await.map_err(|e| {
            CryptoError::Decrypt(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        let status = tokio::fs::read_to_string(status_file.path())
            .await
            .map_err(|e| CryptoError::Decrypt(format!("cannot read gpg status: {}", e)))?;

        let report = DecryptionReport::parse(&status);
        let diagnostics = if output.status.success() {
            String::new()
        } else {
            process::diagnostics(&output)
        };
        report.authorize(expected_signer, &diagnostics)?;

        if !output.status.success() {
            return Err(CryptoError::Decrypt(diagnostics));
        }
        Ok(output.stdout)
    }
}
