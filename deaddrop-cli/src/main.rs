use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deaddrop_core::logging::{init_logging_with_config, LogConfig};
use deaddrop_core::{Config, Exchange, GnupgEngine};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "deaddrop")]
#[command(author, version, about = "Signed and encrypted dead-drop messages over gists", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a counterpart whose public key is in the keyring
    AddReceiver {
        nickname: String,
        /// Gist id the counterpart publishes to
        inbound_endpoint: String,
        /// Git URL of the gist we publish to
        outbound_address: String,
    },

    /// Encrypt, sign and publish a message for a counterpart
    To {
        nickname: String,
        /// File holding the message; stdin when omitted or `-`
        message_file: Option<PathBuf>,
    },

    /// Fetch, decrypt and verify the latest message from a counterpart
    From { nickname: String },

    /// List registered counterparts
    Receivers,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    debug!(registry = %config.registry_path.display(), "configuration loaded");

    if !matches!(args.command, Command::Receivers) {
        GnupgEngine::ensure_available(&config.gpg_program).await?;
    }

    let exchange = Exchange::from_config(&config)?;

    match args.command {
        Command::AddReceiver {
            nickname,
            inbound_endpoint,
            outbound_address,
        } => {
            exchange
                .add_receiver(&nickname, &inbound_endpoint, &outbound_address)
                .await?;
        }
        Command::To {
            nickname,
            message_file,
        } => {
            let message = read_message(message_file).await?;
            exchange.send(&nickname, &message).await?;
        }
        Command::From { nickname } => {
            let mut plaintext = exchange.receive(&nickname).await?;
            if !plaintext.ends_with(b"\n") {
                plaintext.push(b'\n');
            }
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&plaintext).await?;
            stdout.flush().await?;
        }
        Command::Receivers => {
            let mut out = String::new();
            for record in exchange.receivers()? {
                out.push_str(&format!(
                    "{}\t{}\t{}\n",
                    record.nickname, record.inbound_endpoint, record.outbound_address
                ));
            }
            let mut stdout = tokio::io::stdout();
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

async fn read_message(path: Option<PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut message = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut message)
                .await
                .context("Failed to read message from stdin")?;
            Ok(message)
        }
    }
}
