/*
    GnupgEngine and GnupgKeyDirectory against a real gpg.

    Every party gets its own throwaway home directory with freshly generated,
    unprotected keys. A small wrapper script pins `--homedir` and
    `--trust-model always` so the code under test runs `gpg` exactly as it
    would against a user's keyring.

    Bob knows the public keys of Alice and Mallory. Mallory additionally holds
    a copy of Alice's secret key and a "stranger" key nobody else knows, so
    she can produce envelopes carrying several signatures.

    Skipped when gpg is not installed.
*/

#![cfg(unix)]

mod common;

use common::gpg_available;
use deaddrop_core::identity::GnupgKeyDirectory;
use deaddrop_core::{CryptoEngine, CryptoError, GnupgEngine, Identity, IdentityResolver};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// One GnuPG home and the wrapper that points `gpg` at it.
struct Keyring {
    home: PathBuf,
    program: PathBuf,
}

impl Keyring {
    fn new(root: &Path, name: &str) -> Self {
        let home = root.join(format!("{name}-gnupg"));
        fs::create_dir_all(&home).unwrap();
        fs::set_permissions(&home, fs::Permissions::from_mode(0o700)).unwrap();

        let program = root.join(format!("{name}-gpg"));
        fs::write(
            &program,
            format!(
                "#!/bin/sh\nexec gpg --homedir '{}' --trust-model always \"$@\"\n",
                home.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        Self { home, program }
    }

    /// Run gpg in this home, feeding `input`, and return stdout.
    fn gpg(&self, args: &[&str], input: &[u8]) -> Vec<u8> {
        let mut child = Command::new(&self.program)
            .arg("--batch")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child.stdin.take().unwrap().write_all(input).unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "gpg {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        output.stdout
    }

    /// Generate an unprotected signing key with an encryption subkey.
    fn generate(&self, name: &str) {
        self.gpg(
            &[
                "--pinentry-mode",
                "loopback",
                "--passphrase",
                "",
                "--quick-gen-key",
                &format!("{name} <{name}@deaddrop.invalid>"),
                "future-default",
                "default",
                "never",
            ],
            b"",
        );
    }

    fn export_public(&self, name: &str) -> Vec<u8> {
        self.gpg(&["--armor", "--export", name], b"")
    }

    fn export_secret(&self, name: &str) -> Vec<u8> {
        self.gpg(
            &[
                "--pinentry-mode",
                "loopback",
                "--passphrase",
                "",
                "--armor",
                "--export-secret-keys",
                name,
            ],
            b"",
        )
    }

    fn import(&self, key: &[u8]) {
        self.gpg(&["--import"], key);
    }

    async fn resolve(&self, pattern: &str) -> Identity {
        IdentityResolver::new(Arc::new(GnupgKeyDirectory::new(&self.program)))
            .resolve(pattern)
            .await
            .unwrap()
    }

    fn engine(&self) -> GnupgEngine {
        GnupgEngine::new(&self.program)
    }
}

impl Drop for Keyring {
    fn drop(&mut self) {
        let _ = Command::new("gpgconf")
            .arg("--homedir")
            .arg(&self.home)
            .args(["--kill", "gpg-agent"])
            .output();
    }
}

// Keyrings first: their agents are stopped before the directory goes away.
struct World {
    alice: Keyring,
    bob: Keyring,
    mallory: Keyring,
    _root: tempfile::TempDir,
}

fn world() -> World {
    let root = tempfile::tempdir().unwrap();
    let alice = Keyring::new(root.path(), "alice");
    let bob = Keyring::new(root.path(), "bob");
    let mallory = Keyring::new(root.path(), "mallory");

    alice.generate("alice");
    bob.generate("bob");
    mallory.generate("mallory");
    mallory.generate("stranger");

    alice.import(&bob.export_public("bob"));
    bob.import(&alice.export_public("alice"));
    bob.import(&mallory.export_public("mallory"));
    mallory.import(&bob.export_public("bob"));
    mallory.import(&alice.export_secret("alice"));

    World {
        alice,
        bob,
        mallory,
        _root: root,
    }
}

#[tokio::test]
async fn test_real_gpg_round_trip() {
    if !gpg_available() {
        eprintln!("gpg not installed, skipping");
        return;
    }
    let w = world();
    let bob_id = w.alice.resolve("bob").await;
    let alice_id = w.bob.resolve("alice").await;

    let armored = w
        .alice
        .engine()
        .seal_outbound(b"hello bob\n", &bob_id)
        .await
        .unwrap();
    assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));
    assert!(!armored.contains("hello bob"));

    let plaintext = w
        .bob
        .engine()
        .open_inbound(armored.as_bytes(), &alice_id)
        .await
        .unwrap();
    assert_eq!(plaintext, b"hello bob\n");
}

#[tokio::test]
async fn test_real_gpg_resolves_exactly_one_fingerprint() {
    if !gpg_available() {
        return;
    }
    let w = world();

    let from_alice = w.alice.resolve("bob").await;
    let from_bob = w.bob.resolve("bob@deaddrop.invalid").await;
    assert_eq!(from_alice, from_bob);
    assert_eq!(from_alice.fingerprint().len(), 40);

    let unknown = IdentityResolver::new(Arc::new(GnupgKeyDirectory::new(&w.alice.program)))
        .resolve("carol")
        .await;
    assert!(unknown.is_err());
}

#[tokio::test]
async fn test_real_gpg_rejects_other_expected_signer() {
    if !gpg_available() {
        return;
    }
    let w = world();
    let bob_id = w.alice.resolve("bob").await;
    let mallory_id = w.bob.resolve("mallory").await;

    let armored = w
        .alice
        .engine()
        .seal_outbound(b"from alice", &bob_id)
        .await
        .unwrap();

    let result = w
        .bob
        .engine()
        .open_inbound(armored.as_bytes(), &mallory_id)
        .await;
    match result {
        Err(CryptoError::SignerMismatch { expected, .. }) => {
            assert_eq!(expected, mallory_id.fingerprint())
        }
        other => panic!("expected SignerMismatch, got {other:?}"),
    }
}

/// Alice's signature is genuine, but Mallory signed the same envelope.
#[tokio::test]
async fn test_real_gpg_rejects_second_known_signature() {
    if !gpg_available() {
        return;
    }
    let w = world();
    let alice_id = w.bob.resolve("alice").await;
    let bob_id = w.mallory.resolve("bob").await;

    let armored = w.mallory.gpg(
        &[
            "--armor",
            "--sign",
            "--encrypt",
            "--local-user",
            "alice",
            "--local-user",
            "mallory",
            "--recipient",
            bob_id.fingerprint(),
        ],
        b"co-signed",
    );

    let result = w.bob.engine().open_inbound(&armored, &alice_id).await;
    assert!(
        matches!(result, Err(CryptoError::SignerMismatch { .. })),
        "got {result:?}"
    );
}

/// Alice's signature next to one from a key Bob has never seen.
#[tokio::test]
async fn test_real_gpg_rejects_second_unknown_signature() {
    if !gpg_available() {
        return;
    }
    let w = world();
    let alice_id = w.bob.resolve("alice").await;
    let bob_id = w.mallory.resolve("bob").await;

    let armored = w.mallory.gpg(
        &[
            "--armor",
            "--sign",
            "--encrypt",
            "--local-user",
            "alice",
            "--local-user",
            "stranger",
            "--recipient",
            bob_id.fingerprint(),
        ],
        b"co-signed",
    );

    let result = w.bob.engine().open_inbound(&armored, &alice_id).await;
    assert!(
        matches!(result, Err(CryptoError::UnverifiedSignature(1))),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_real_gpg_rejects_unsigned_message() {
    if !gpg_available() {
        return;
    }
    let w = world();
    let bob_id = w.alice.resolve("bob").await;
    let alice_id = w.bob.resolve("alice").await;

    let armored = w.alice.gpg(
        &["--armor", "--encrypt", "--recipient", bob_id.fingerprint()],
        b"no signature",
    );

    let result = w.bob.engine().open_inbound(&armored, &alice_id).await;
    assert!(
        matches!(result, Err(CryptoError::SignatureMissing)),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_real_gpg_message_for_someone_else_fails_to_decrypt() {
    if !gpg_available() {
        return;
    }
    let w = world();
    let bob_id = w.alice.resolve("bob").await;
    let armored = w
        .alice
        .engine()
        .seal_outbound(b"for bob only", &bob_id)
        .await
        .unwrap();
    let alice_id = w.mallory.resolve("alice").await;

    // Mallory holds Alice's secret key but not Bob's.
    let result = w
        .mallory
        .engine()
        .open_inbound(armored.as_bytes(), &alice_id)
        .await;
    assert!(matches!(result, Err(CryptoError::Decrypt(_))), "got {result:?}");
}
