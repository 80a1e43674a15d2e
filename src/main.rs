//! # chat-cipher
//!
//! Client-side encryption for chat messages, byte-compatible with the chat
//! backend's AES-256-GCM format.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │  CLI (clap)  │
//!                  └──────┬───────┘
//!               ┌─────────┴─────────┐
//!               ▼                   ▼
//!         ┌───────────┐     ┌────────────────┐
//!         │  Config   │     │ ChatEncryption │
//!         │  (TOML)   │     │ (Sealed JSON)  │
//!         └─────┬─────┘     └───────┬────────┘
//!               │                   │
//!               └─────────┬─────────┘
//!                         ▼
//!               ┌───────────────────┐
//!               │   MessageCipher   │
//!               │ PBKDF2 + AES-GCM  │
//!               └───────────────────┘
//! ```

mod config;
mod crypto;
mod envelope;
mod error;

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// chat-cipher — encrypt and decrypt chat messages with a shared passphrase
#[derive(Parser, Debug)]
#[command(
    name = "chat-cipher",
    version,
    about = "Encrypt and decrypt chat messages with a shared passphrase 🔒",
    long_about = "chat-cipher derives an AES-256 key from a shared passphrase with \
                  PBKDF2-HMAC-SHA256 and encrypts messages with AES-256-GCM. Each \
                  message carries its own random salt and nonce and is printed as \
                  base64.\n\n\
                  The passphrase is taken from --passphrase, then the \
                  CHAT_CIPHER_PASSPHRASE environment variable, then the config file."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (overrides default search)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "chat-cipher.toml")]
        output: PathBuf,
    },

    /// Encrypt a message and print the base64 blob
    Encrypt {
        /// Message to encrypt (read from stdin when omitted)
        message: Option<String>,

        /// Passphrase (or set CHAT_CIPHER_PASSPHRASE)
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Decrypt a base64 blob and print the message
    Decrypt {
        /// Blob to decrypt (read from stdin when omitted)
        blob: Option<String>,

        /// Passphrase (or set CHAT_CIPHER_PASSPHRASE)
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Wrap a message as sealed JSON, falling back to plaintext without a passphrase
    Seal {
        /// Message to seal (read from stdin when omitted)
        message: Option<String>,

        /// Passphrase (or set CHAT_CIPHER_PASSPHRASE)
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Read sealed JSON and print the message it carries
    Open {
        /// Sealed JSON (read from stdin when omitted)
        json: Option<String>,

        /// Passphrase (or set CHAT_CIPHER_PASSPHRASE)
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Check whether encryption is available on this platform
    Check,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", colored::Colorize::red("error:"), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "chat_cipher=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    match &cli.command {
        Command::Init { output } => cmd_init(output),
        Command::Encrypt {
            message,
            passphrase,
        } => cmd_encrypt(&cli, message.as_deref(), passphrase.as_deref()),
        Command::Decrypt { blob, passphrase } => {
            cmd_decrypt(&cli, blob.as_deref(), passphrase.as_deref())
        }
        Command::Seal {
            message,
            passphrase,
        } => cmd_seal(&cli, message.as_deref(), passphrase.as_deref()),
        Command::Open { json, passphrase } => {
            cmd_open(&cli, json.as_deref(), passphrase.as_deref())
        }
        Command::Check => cmd_check(&cli),
    }
}

// ─── Command Implementations ────────────────────────────────────────────────

fn cmd_init(output: &Path) -> error::Result<()> {
    config::init_config(output)?;
    eprintln!(
        "{} Created configuration file: {}",
        colored::Colorize::green("✓"),
        output.display(),
    );
    eprintln!(
        "  Export {} with the backend's passphrase, then run:",
        config::DEFAULT_PASSPHRASE_ENV
    );
    eprintln!("  {} chat-cipher encrypt \"hello\"", colored::Colorize::bold("$"));
    Ok(())
}

fn cmd_encrypt(cli: &Cli, message: Option<&str>, passphrase: Option<&str>) -> error::Result<()> {
    let cipher = load_config(cli)?.require_cipher(passphrase)?;
    let message = input_or_stdin(message)?;

    let blob = cipher.encrypt(&message)?;
    println!("{blob}");
    Ok(())
}

fn cmd_decrypt(cli: &Cli, blob: Option<&str>, passphrase: Option<&str>) -> error::Result<()> {
    let cipher = load_config(cli)?.require_cipher(passphrase)?;
    let blob = input_or_stdin(blob)?;

    let message = cipher.decrypt(&blob)?;
    println!("{message}");
    Ok(())
}

fn cmd_seal(cli: &Cli, message: Option<&str>, passphrase: Option<&str>) -> error::Result<()> {
    let cfg = load_config(cli)?;
    let chat = envelope::ChatEncryption::new(cfg.cipher(passphrase)?);
    let message = input_or_stdin(message)?;

    let sealed = chat.seal(&message)?;
    if cli.verbose && !sealed.is_encrypted() {
        eprintln!(
            "  {} message left unencrypted",
            colored::Colorize::yellow("!"),
        );
    }
    println!("{}", sealed.to_json()?);
    Ok(())
}

fn cmd_open(cli: &Cli, json: Option<&str>, passphrase: Option<&str>) -> error::Result<()> {
    let cfg = load_config(cli)?;
    let chat = envelope::ChatEncryption::new(cfg.cipher(passphrase)?);
    let sealed = envelope::Sealed::from_json(&input_or_stdin(json)?)?;

    println!("{}", chat.open(&sealed)?);
    Ok(())
}

fn cmd_check(cli: &Cli) -> error::Result<()> {
    if !crypto::is_available() {
        return Err(
            anyhow::anyhow!("secure random generator unavailable; encryption is disabled").into(),
        );
    }

    eprintln!(
        "  {} AES-256-GCM with PBKDF2-HMAC-SHA256 ({} iterations) is available",
        colored::Colorize::green("✓"),
        crypto::PBKDF2_ITERATIONS,
    );

    let cfg = load_config(cli)?;
    let chat = envelope::ChatEncryption::new(cfg.cipher(None)?);
    if chat.is_supported() {
        eprintln!("  {} passphrase configured", colored::Colorize::green("✓"));
    } else {
        eprintln!(
            "  {} no passphrase configured; `seal` will send plaintext (set {})",
            colored::Colorize::yellow("!"),
            cfg.cipher.passphrase_env,
        );
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn load_config(cli: &Cli) -> error::Result<config::Config> {
    if let Some(path) = &cli.config {
        config::load_config_from(path)
    } else {
        config::load_config_or_default()
    }
}

/// Uses the argument if given, otherwise reads all of stdin.
///
/// A single trailing newline from stdin is dropped so `echo msg | ...` works.
fn input_or_stdin(arg: Option<&str>) -> error::Result<String> {
    if let Some(value) = arg {
        return Ok(value.to_string());
    }

    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(buf)
}
