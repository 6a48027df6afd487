//! Test helpers shared by unit tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Argument parsing shared by every fake `gpg`. Exposes `$mode`
/// (list/encrypt/decrypt), `$status`, `$recipient` and `$pattern` to the body.
const GPG_PRELUDE: &str = r#"#!/bin/sh
mode=""
status=/dev/null
recipient=""
pattern=""
while [ $# -gt 0 ]; do
  case "$1" in
    --) pattern="$2"; shift ;;
    --status-file) status="$2"; shift ;;
    --recipient) recipient="$2"; shift ;;
    --list-keys) mode=list ;;
    --encrypt) mode=encrypt ;;
    --decrypt) mode=decrypt ;;
  esac
  shift
done
"#;

/// Write an executable stand-in for `gpg` into `dir` running `body`.
pub(crate) fn fake_gpg(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("gpg");
    fs::write(&path, format!("{GPG_PRELUDE}{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}
