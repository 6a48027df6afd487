//! In-memory mailbox
//!
//! Publish and fetch share one namespace, so a test can publish to an
//! address and read it back under the same string.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{MailboxError, MailboxTransport};

#[derive(Debug, Default)]
struct Slot {
    content: Vec<u8>,
    revisions: usize,
}

/// In-memory mailbox (for testing)
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a mailbox as if a counterpart had published to it.
    pub async fn put(&self, id: &str, content: impl Into<Vec<u8>>) {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(id.to_string()).or_default();
        slot.content = content.into();
        slot.revisions += 1;
    }

    /// Current content of a mailbox, if anything was ever published.
    pub async fn snapshot(&self, id: &str) -> Option<Vec<u8>> {
        self.slots.read().await.get(id).map(|s| s.content.clone())
    }

    /// Number of publishes recorded for a mailbox.
    pub async fn revisions(&self, id: &str) -> usize {
        self.slots.read().await.get(id).map_or(0, |s| s.revisions)
    }
}

#[async_trait]
impl MailboxTransport for MemoryMailbox {
    async fn publish(&self, address: &str, content: &[u8]) -> Result<(), MailboxError> {
        self.put(address, content).await;
        Ok(())
    }

    async fn fetch(&self, endpoint_id: &str) -> Result<Vec<u8>, MailboxError> {
        self.snapshot(endpoint_id)
            .await
            .ok_or_else(|| MailboxError::fetch(endpoint_id, "No file in gist"))
    }
}
