//! Mailbox transport
//!
//! A mailbox is a single-slot, publicly readable dead drop. The write side is
//! a git remote whose whole tracked content is replaced by one payload file on
//! every publish; the read side is the gist API, which hands back the current
//! files of a gist by id. There is no history, ordering or locking: the last
//! successful push is the message.

use async_trait::async_trait;
use thiserror::Error;

mod gist;
mod git;
mod memory;

pub use gist::GistFetcher;
pub use git::GitPublisher;
pub use memory::MemoryMailbox;

use crate::config::{Config, ConfigError};

/// Mailbox errors
#[derive(Debug, Error)]
pub enum MailboxError {
    /// A publish step failed; nothing after it ran.
    #[error("Failed to publish to {address} ({step}): {detail}")]
    Publish {
        address: String,
        step: &'static str,
        detail: String,
    },

    #[error("Failed to fetch mailbox '{endpoint}': {detail}")]
    Fetch { endpoint: String, detail: String },
}

impl MailboxError {
    pub(crate) fn fetch(endpoint: &str, detail: impl ToString) -> Self {
        MailboxError::Fetch {
            endpoint: endpoint.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Publish/fetch capability used by the exchange flows.
#[async_trait]
pub trait MailboxTransport: Send + Sync {
    /// Replace the mailbox at `address` with a single file holding `content`.
    async fn publish(&self, address: &str, content: &[u8]) -> Result<(), MailboxError>;

    /// Current payload of the mailbox identified by `endpoint_id`.
    async fn fetch(&self, endpoint_id: &str) -> Result<Vec<u8>, MailboxError>;
}

/// Gist-backed mailbox: git push to write, REST API to read.
pub struct GistMailbox {
    publisher: GitPublisher,
    fetcher: GistFetcher,
}

impl GistMailbox {
    pub fn new(publisher: GitPublisher, fetcher: GistFetcher) -> Self {
        Self { publisher, fetcher }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let publisher = GitPublisher::new(
            &config.git_program,
            &config.cache_dir,
            &config.payload_file,
            &config.commit_message,
        );
        let fetcher = GistFetcher::new(&config.gist_api_base, config.github_token.clone())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self::new(publisher, fetcher))
    }
}

#[async_trait]
impl MailboxTransport for GistMailbox {
    async fn publish(&self, address: &str, content: &[u8]) -> Result<(), MailboxError> {
        self.publisher.publish(address, content).await
    }

    async fn fetch(&self, endpoint_id: &str) -> Result<Vec<u8>, MailboxError> {
        self.fetcher.fetch(endpoint_id).await
    }
}
