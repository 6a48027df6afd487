//! Shared fixtures for the integration tests: a local bare git remote, a
//! scripted stand-in for `gpg`, and availability checks for the real tools.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;

static GIT_ENV: Once = Once::new();

/// Whether a usable `git` is on PATH; tests that need one skip otherwise.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Whether a real `gpg` is on PATH.
pub fn gpg_available() -> bool {
    Command::new("gpg")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Pin commit identity and ignore the developer's own git config.
pub fn isolate_git() {
    GIT_ENV.call_once(|| {
        for (key, value) in [
            ("GIT_AUTHOR_NAME", "deaddrop test"),
            ("GIT_AUTHOR_EMAIL", "test@deaddrop.invalid"),
            ("GIT_COMMITTER_NAME", "deaddrop test"),
            ("GIT_COMMITTER_EMAIL", "test@deaddrop.invalid"),
            ("GIT_CONFIG_NOSYSTEM", "1"),
            ("GIT_CONFIG_GLOBAL", "/dev/null"),
        ] {
            std::env::set_var(key, value);
        }
    });
}

pub fn git(args: &[&str]) -> String {
    let output = Command::new("git").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// A bare repository with one seed commit on `main`, like a freshly
/// created gist with a placeholder file.
pub fn bare_remote(root: &Path, name: &str) -> PathBuf {
    isolate_git();

    let bare = root.join(format!("{name}.git"));
    let seed = root.join(format!("{name}-seed"));
    let bare_s = bare.to_str().unwrap();
    let seed_s = seed.to_str().unwrap();

    git(&["init", "--quiet", "--bare", bare_s]);
    git(&["--git-dir", bare_s, "symbolic-ref", "HEAD", "refs/heads/main"]);

    git(&["init", "--quiet", seed_s]);
    fs::write(seed.join("placeholder.md"), "nothing yet\n").unwrap();
    git(&["-C", seed_s, "add", "-A"]);
    git(&["-C", seed_s, "commit", "--quiet", "-m", "seed"]);
    git(&["-C", seed_s, "push", "--quiet", bare_s, "HEAD:refs/heads/main"]);

    bare
}

/// Top-level file names on `main` of a bare remote.
pub fn tree(bare: &Path) -> Vec<String> {
    git(&["--git-dir", bare.to_str().unwrap(), "ls-tree", "--name-only", "main"])
        .lines()
        .map(str::to_string)
        .collect()
}

/// Content of `file` on `main` of a bare remote.
pub fn show(bare: &Path, file: &str) -> String {
    git(&[
        "--git-dir",
        bare.to_str().unwrap(),
        "show",
        &format!("main:{file}"),
    ])
}

pub fn revisions(bare: &Path) -> usize {
    git(&["--git-dir", bare.to_str().unwrap(), "rev-list", "--count", "main"])
        .trim()
        .parse()
        .unwrap()
}

/// Scripted `gpg` for the party whose secret key is `me`, with `keys`
/// (nickname, fingerprint) as its public keyring.
///
/// Encryption base64-wraps stdin in a fake armor block naming the recipient
/// and `me` as signer. Decryption only succeeds for messages addressed to
/// `me` and reports the embedded signer as a VALIDSIG status line.
pub fn fake_gpg(dir: &Path, me: &str, keys: &[(&str, &str)]) -> PathBuf {
    let listing: String = keys
        .iter()
        .map(|(nick, fpr)| {
            format!(
                "  {nick}) printf 'pub:u:255:22:{}:0:::u:::scESC:\\nfpr:::::::::{fpr}:\\nuid:u::::0::X::{nick}::::::::::0:\\n' ;;\n",
                &fpr[fpr.len() - 16..]
            )
        })
        .collect();

    let script = format!(
        r#"#!/bin/sh
mode=""
status=/dev/null
recipient=""
pattern=""
while [ $# -gt 0 ]; do
  case "$1" in
    --) pattern="$2"; shift ;;
    --status-file) status="$2"; shift ;;
    --recipient) recipient="$2"; shift ;;
    --version) echo "gpg (fake) 2.4.0"; exit 0 ;;
    --list-keys) mode=list ;;
    --encrypt) mode=encrypt ;;
    --decrypt) mode=decrypt ;;
  esac
  shift
done
case "$mode" in
  list)
    case "$pattern" in
{listing}      *) exit 2 ;;
    esac
    ;;
  encrypt)
    echo "-----BEGIN PGP MESSAGE-----"
    echo "to:$recipient"
    echo "from:{me}"
    base64
    echo "-----END PGP MESSAGE-----"
    ;;
  decrypt)
    input=$(cat)
    to=$(printf '%s\n' "$input" | sed -n 's/^to://p')
    from=$(printf '%s\n' "$input" | sed -n 's/^from://p')
    if [ "$to" != "{me}" ]; then
      echo "[GNUPG:] DECRYPTION_FAILED" >> "$status"
      echo "gpg: decryption failed: No secret key" >&2
      exit 2
    fi
    echo "[GNUPG:] DECRYPTION_OKAY" >> "$status"
    echo "[GNUPG:] VALIDSIG $from 2024-01-01 1704067200 0 4 0 22 10 00 $from" >> "$status"
    printf '%s\n' "$input" | sed '1,3d;$d' | base64 -d
    ;;
  *) exit 9 ;;
esac
"#
    );

    let path = dir.join("gpg");
    fs::write(&path, script).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}
