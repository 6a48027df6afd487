//! Write side: publish a snapshot by committing and pushing a working copy.
//!
//! Working copies live under `cache_dir`, one per remote address, named by a
//! blake3 digest of the address. A reused working copy is first reset to the
//! remote tip, so pushes from other machines never wedge it. Commits use
//! `--allow-empty` so republishing identical bytes still succeeds and records
//! a revision.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::MailboxError;
use crate::process;

/// Publishes snapshots through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    git: PathBuf,
    cache_dir: PathBuf,
    payload_file: String,
    commit_message: String,
}

impl GitPublisher {
    pub fn new(
        git: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        payload_file: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            git: git.into(),
            cache_dir: cache_dir.into(),
            payload_file: payload_file.into(),
            commit_message: commit_message.into(),
        }
    }

    /// Local checkout used for `address`.
    pub fn working_copy(&self, address: &str) -> PathBuf {
        let digest = blake3::hash(address.as_bytes());
        self.cache_dir.join(hex::encode(&digest.as_bytes()[..8]))
    }

    /// Replace the remote's content with a single payload file and push.
    pub async fn publish(&self, address: &str, content: &[u8]) -> Result<(), MailboxError> {
        let path = self.working_copy(address);
        debug!(address, path = %path.display(), bytes = content.len(), "publishing snapshot");

        self.ensure_working_copy(address, &path).await?;
        self.replace_contents(address, &path, content).await?;

        let mut add = self.git_in(&path);
        add.args(["add", "-A"]);
        self.run_step(address, "add", add).await?;

        let mut commit = self.git_in(&path);
        commit
            .args(["commit", "--quiet", "--allow-empty", "-m"])
            .arg(&self.commit_message);
        self.run_step(address, "commit", commit).await?;

        let mut push = self.git_in(&path);
        push.args(["push", "--quiet", "origin", "HEAD"]);
        self.run_step(address, "push", push).await?;

        info!(address, "snapshot published");
        Ok(())
    }

    /// Make sure `path` is a clone of `address` at the remote's current tip,
    /// recloning when it is missing, tracks something else, or cannot be
    /// brought up to date.
    async fn ensure_working_copy(&self, address: &str, path: &Path) -> Result<(), MailboxError> {
        if self.tracks(address, path).await {
            match self.sync(address, path).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!(error = %e, "working copy cannot be synced, recloning"),
            }
        }

        if fs::try_exists(path).await.unwrap_or(false) {
            debug!(path = %path.display(), "discarding stale working copy");
            fs::remove_dir_all(path)
                .await
                .map_err(|e| publish_error(address, "clone", e))?;
        }
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| publish_error(address, "clone", e))?;

        let mut clone = Command::new(&self.git);
        clone.args(["clone", "--quiet", "--", address]).arg(path);
        self.run_step(address, "clone", clone).await?;
        Ok(())
    }

    async fn tracks(&self, address: &str, path: &Path) -> bool {
        if !fs::try_exists(path.join(".git")).await.unwrap_or(false) {
            return false;
        }

        let mut cmd = self.git_in(path);
        cmd.args(["remote", "-v"]);
        match process::run(cmd).await {
            Ok(output) if output.status.success() => {
                origin_matches(&String::from_utf8_lossy(&output.stdout), address)
            }
            _ => false,
        }
    }

    /// Fetch and hard-reset to the upstream branch. Local history is never
    /// worth keeping: every publish replaces the whole snapshot.
    async fn sync(&self, address: &str, path: &Path) -> Result<(), MailboxError> {
        let mut fetch = self.git_in(path);
        fetch.args(["fetch", "--quiet", "origin"]);
        self.run_step(address, "fetch", fetch).await?;

        let mut reset = self.git_in(path);
        reset.args(["reset", "--hard", "--quiet", "@{upstream}"]);
        self.run_step(address, "reset", reset).await?;
        Ok(())
    }

    /// Remove every top-level entry except `.git`, then write the payload.
    async fn replace_contents(
        &self,
        address: &str,
        path: &Path,
        content: &[u8],
    ) -> Result<(), MailboxError> {
        let write = async {
            let mut entries = fs::read_dir(path).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name() == ".git" {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    fs::remove_dir_all(entry.path()).await?;
                } else {
                    fs::remove_file(entry.path()).await?;
                }
            }
            fs::write(path.join(&self.payload_file), content).await
        };

        write
            .await
            .map_err(|e: io::Error| publish_error(address, "write", e))
    }

    fn git_in(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.arg("-C").arg(path);
        cmd
    }

    async fn run_step(
        &self,
        address: &str,
        step: &'static str,
        cmd: Command,
    ) -> Result<Output, MailboxError> {
        let output = process::run(cmd)
            .await
            .map_err(|e| publish_error(address, step, format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(publish_error(address, step, process::diagnostics(&output)));
        }
        Ok(output)
    }
}

fn publish_error(address: &str, step: &'static str, detail: impl ToString) -> MailboxError {
    MailboxError::Publish {
        address: address.to_string(),
        step,
        detail: detail.to_string(),
    }
}

/// Whether `git remote -v` output lists `address` as the `origin` remote.
fn origin_matches(remotes: &str, address: &str) -> bool {
    remotes.lines().any(|line| {
        let mut fields = line.split_whitespace();
        fields.next() == Some("origin") && fields.next() == Some(address)
    })
}
