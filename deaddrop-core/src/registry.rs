//! Recipient registry
//!
//! A JSON document listing every counterpart this installation exchanges
//! messages with:
//!
//! ```json
//! { "receivers": [ { "nickname": "bob", "rx_gist_id": "...", "tx_gist_url": "..." } ] }
//! ```
//!
//! The file is always read and written whole. There is no locking: one user,
//! one machine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("{0} is already configured")]
    DuplicateNickname(String),

    #[error("Invalid receiver: {0}")]
    InvalidRecord(String),

    #[error("Registry I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Registry at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    /// Unique handle; also the key-lookup pattern
    pub nickname: String,
    /// Where the counterpart publishes messages for us
    #[serde(rename = "rx_gist_id")]
    pub inbound_endpoint: String,
    /// Where we publish messages for the counterpart
    #[serde(rename = "tx_gist_url")]
    pub outbound_address: String,
}

impl RecipientRecord {
    pub fn new(
        nickname: impl Into<String>,
        inbound_endpoint: impl Into<String>,
        outbound_address: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let record = Self {
            nickname: nickname.into(),
            inbound_endpoint: inbound_endpoint.into(),
            outbound_address: outbound_address.into(),
        };

        for (field, value) in [
            ("nickname", &record.nickname),
            ("inbound endpoint", &record.inbound_endpoint),
            ("outbound address", &record.outbound_address),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::InvalidRecord(format!("{} is empty", field)));
            }
        }
        Ok(record)
    }
}

/// In-memory registry document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    receivers: Vec<RecipientRecord>,
}

impl Registry {
    pub fn add(&mut self, record: RecipientRecord) -> Result<(), RegistryError> {
        if self.find(&record.nickname).is_some() {
            return Err(RegistryError::DuplicateNickname(record.nickname));
        }
        self.receivers.push(record);
        Ok(())
    }

    pub fn find(&self, nickname: &str) -> Option<&RecipientRecord> {
        self.receivers.iter().find(|r| r.nickname == nickname)
    }

    /// Records in insertion order.
    pub fn list(&self) -> &[RecipientRecord] {
        &self.receivers
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}

/// File-backed registry; every operation reloads from disk.
#[derive(Debug, Clone)]
pub struct RecipientRegistry {
    path: PathBuf,
}

impl RecipientRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or blank file means an empty registry.
    pub fn load(&self) -> Result<Registry, RegistryError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Registry::default()),
            Err(source) => {
                return Err(RegistryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(Registry::default());
        }

        serde_json::from_str(&contents).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the whole document (temp file + rename).
    pub fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut contents = serde_json::to_string_pretty(registry).map_err(|source| {
            RegistryError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        contents.push('\n');

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, contents).map_err(io_err)?;
        fs::rename(&temp_path, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), receivers = registry.len(), "registry saved");
        Ok(())
    }

    pub fn add(&self, record: RecipientRecord) -> Result<(), RegistryError> {
        let mut registry = self.load()?;
        registry.add(record)?;
        self.save(&registry)
    }

    pub fn find(&self, nickname: &str) -> Result<RecipientRecord, RegistryError> {
        self.load()?
            .find(nickname)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(nickname.to_string()))
    }

    pub fn list(&self) -> Result<Vec<RecipientRecord>, RegistryError> {
        Ok(self.load()?.receivers)
    }
}
