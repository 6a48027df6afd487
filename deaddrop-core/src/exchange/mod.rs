//! Exchange flows
//!
//! Composes identity resolution, the crypto engine, the mailbox transport and
//! the registry into the user-facing operations. Each flow runs its stages in
//! order and stops at the first failure; nothing is retried and nothing is
//! reported as done unless every stage finished.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

mod errors;

pub use errors::{ExchangeError, ExchangeResult, FailureKind};

use crate::config::Config;
use crate::crypto::{CryptoEngine, GnupgEngine};
use crate::identity::{GnupgKeyDirectory, IdentityResolver};
use crate::mailbox::{GistMailbox, MailboxTransport};
use crate::registry::{RecipientRecord, RecipientRegistry};

/// Stages of the send and receive flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingIdentity,
    Encrypting,
    Publishing,
    Fetching,
    DecryptingAndVerifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ResolvingIdentity => "resolving-identity",
            Stage::Encrypting => "encrypting",
            Stage::Publishing => "publishing",
            Stage::Fetching => "fetching",
            Stage::DecryptingAndVerifying => "decrypting-and-verifying",
        })
    }
}

/// The dead-drop exchange.
pub struct Exchange {
    registry: RecipientRegistry,
    resolver: IdentityResolver,
    crypto: Arc<dyn CryptoEngine>,
    mailbox: Arc<dyn MailboxTransport>,
}

impl Exchange {
    pub fn new(
        registry: RecipientRegistry,
        resolver: IdentityResolver,
        crypto: Arc<dyn CryptoEngine>,
        mailbox: Arc<dyn MailboxTransport>,
    ) -> Self {
        Self {
            registry,
            resolver,
            crypto,
            mailbox,
        }
    }

    /// GnuPG for keys and crypto, git + gist API for the mailbox.
    pub fn from_config(config: &Config) -> ExchangeResult<Self> {
        let directory = GnupgKeyDirectory::new(&config.gpg_program);
        let crypto = GnupgEngine::new(&config.gpg_program);
        let mailbox = GistMailbox::from_config(config)?;

        Ok(Self::new(
            RecipientRegistry::new(&config.registry_path),
            IdentityResolver::new(Arc::new(directory)),
            Arc::new(crypto),
            Arc::new(mailbox),
        ))
    }

    /// Register a counterpart. Its nickname must resolve to exactly one key;
    /// the registry is untouched when it does not.
    pub async fn add_receiver(
        &self,
        nickname: &str,
        inbound_endpoint: &str,
        outbound_address: &str,
    ) -> ExchangeResult<RecipientRecord> {
        let record = RecipientRecord::new(nickname, inbound_endpoint, outbound_address)?;
        let identity = self.resolver.resolve(nickname).await?;

        self.registry.add(record.clone())?;
        info!(nickname, fingerprint = %identity, "receiver added");
        Ok(record)
    }

    /// Registered counterparts, in the order they were added.
    pub fn receivers(&self) -> ExchangeResult<Vec<RecipientRecord>> {
        Ok(self.registry.list()?)
    }

    /// Seal `plaintext` for `nickname` and publish it to their mailbox.
    pub async fn send(&self, nickname: &str, plaintext: &[u8]) -> ExchangeResult<()> {
        let record = self.registry.find(nickname)?;

        debug!(nickname, stage = %Stage::ResolvingIdentity);
        let recipient = self.resolver.resolve(&record.nickname).await?;

        debug!(nickname, stage = %Stage::Encrypting, recipient = %recipient);
        let armored = self.crypto.seal_outbound(plaintext, &recipient).await?;

        debug!(nickname, stage = %Stage::Publishing, address = %record.outbound_address);
        self.mailbox
            .publish(&record.outbound_address, armored.as_bytes())
            .await?;

        info!(nickname, bytes = plaintext.len(), "message sent");
        Ok(())
    }

    /// Fetch the current message from `nickname` and return it once it has
    /// been decrypted and verified as theirs.
    pub async fn receive(&self, nickname: &str) -> ExchangeResult<Vec<u8>> {
        let record = self.registry.find(nickname)?;

        debug!(nickname, stage = %Stage::ResolvingIdentity);
        let sender = self.resolver.resolve(&record.nickname).await?;

        debug!(nickname, stage = %Stage::Fetching, endpoint = %record.inbound_endpoint);
        let armored = self.mailbox.fetch(&record.inbound_endpoint).await?;

        debug!(nickname, stage = %Stage::DecryptingAndVerifying, sender = %sender);
        let plaintext = self.crypto.open_inbound(&armored, &sender).await?;

        info!(nickname, bytes = plaintext.len(), "message received");
        Ok(plaintext)
    }
}
