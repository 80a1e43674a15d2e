//! # Error Types
//!
//! Structured error hierarchy for the message cipher using `thiserror`.
//! Cipher failures are deliberately coarse: every tag mismatch surfaces as the
//! same [`CipherError::Authentication`] so callers cannot tell a wrong
//! passphrase from a tampered blob.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type encompassing all failure modes of the tool.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("invalid sealed message: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found (searched: {searched:?})")]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to parse config: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {message}")]
    Validation { message: String },

    #[error("no passphrase configured (use --passphrase, ${env_var}, or cipher.passphrase)")]
    MissingPassphrase { env_var: String },
}

/// Failures of the encrypt/decrypt primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    /// Randomness, key setup or the AEAD primitive failed while encrypting.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Tag verification failed. Covers wrong passphrase and tampering alike.
    #[error("decryption failed: authentication tag mismatch (corrupted data or wrong passphrase)")]
    Authentication,

    #[error("malformed ciphertext: {0}")]
    MalformedInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
