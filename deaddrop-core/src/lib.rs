//! Dead-drop messaging over public mailboxes.
//!
//! Messages are encrypted to the recipient and signed by the sender with
//! OpenPGP, then published to a mailbox anyone can read. The receiver fetches
//! the current mailbox content and accepts it only when it decrypts and
//! carries a valid signature from the expected sender.

pub mod config;
pub mod crypto;
pub mod exchange;
pub mod identity;
pub mod logging;
pub mod mailbox;
pub mod registry;

mod process;

#[cfg(all(test, unix))]
mod test_utils;

pub use config::{Config, ConfigError};
pub use crypto::{CryptoEngine, CryptoError, GnupgEngine};
pub use exchange::{Exchange, ExchangeError, ExchangeResult, FailureKind, Stage};
pub use identity::{Identity, IdentityError, IdentityResolver, KeyDirectory};
pub use logging::{init_logging_with_config, LogConfig, LogLevel};
pub use mailbox::{GistMailbox, MailboxError, MailboxTransport, MemoryMailbox};
pub use registry::{RecipientRecord, RecipientRegistry, RegistryError};
