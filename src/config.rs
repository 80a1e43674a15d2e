//! # Configuration
//!
//! Loads the cipher settings from a TOML file found in the standard search
//! locations, then resolves the passphrase. The passphrase is never compiled
//! in: it comes from the command line, the environment, or the config file,
//! in that order.

use crate::crypto::MessageCipher;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};
use zeroize::Zeroizing;

/// Environment variable consulted for the passphrase unless overridden.
pub const DEFAULT_PASSPHRASE_ENV: &str = "CHAT_CIPHER_PASSPHRASE";

/// Top-level configuration structure.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub cipher: CipherSettings,
}

/// Settings for the message cipher.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CipherSettings {
    /// Shared passphrase. Prefer the environment variable over storing it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    /// Name of the environment variable holding the passphrase.
    #[serde(default = "default_passphrase_env")]
    pub passphrase_env: String,
}

impl Default for CipherSettings {
    fn default() -> Self {
        Self {
            passphrase: None,
            passphrase_env: default_passphrase_env(),
        }
    }
}

impl std::fmt::Debug for CipherSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherSettings")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("passphrase_env", &self.passphrase_env)
            .finish()
    }
}

fn default_passphrase_env() -> String {
    DEFAULT_PASSPHRASE_ENV.to_string()
}

/// Standard configuration file search paths, in descending priority order.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/chat-cipher.toml")];
    if let Ok(home) = env::var("HOME") {
        paths.push(PathBuf::from(format!("{home}/.config/chat-cipher.toml")));
    }
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(format!("{xdg}/chat-cipher.toml")));
    }
    paths.push(PathBuf::from("chat-cipher.toml"));
    paths
}

/// Loads configuration from the first found config file in the search path.
pub fn load_config() -> Result<Config> {
    let search = config_search_paths();

    for path in &search {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading config");
            return load_config_from(path);
        }
    }

    Err(ConfigError::NotFound { searched: search }.into())
}

/// Like [`load_config`], but a missing file yields the defaults.
///
/// The passphrase may come entirely from the command line or environment, so
/// having no config file is not an error for the CLI.
pub fn load_config_or_default() -> Result<Config> {
    match load_config() {
        Err(crate::error::Error::Config(ConfigError::NotFound { .. })) => Ok(Config::default()),
        other => other,
    }
}

/// Loads and validates configuration from a specific file path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;

    parse_config(&content)
}

fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse { source: e })?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates configuration invariants after parsing.
fn validate_config(config: &Config) -> std::result::Result<(), ConfigError> {
    if let Some(passphrase) = &config.cipher.passphrase {
        if passphrase.is_empty() {
            return Err(ConfigError::Validation {
                message: "cipher.passphrase must not be empty (omit it instead)".to_string(),
            });
        }
    }

    let var = &config.cipher.passphrase_env;
    if var.is_empty() || var.contains('=') || var.contains('\0') {
        return Err(ConfigError::Validation {
            message: format!("cipher.passphrase_env is not a valid variable name: {var:?}"),
        });
    }

    Ok(())
}

impl Config {
    /// Picks the passphrase: explicit override, then environment, then file.
    pub fn resolve_passphrase(&self, explicit: Option<&str>) -> Option<Zeroizing<String>> {
        self.resolve_with(explicit, |name| env::var(name).ok())
    }

    fn resolve_with(
        &self,
        explicit: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Zeroizing<String>> {
        explicit
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| lookup(&self.cipher.passphrase_env).filter(|p| !p.is_empty()))
            .or_else(|| self.cipher.passphrase.clone())
            .map(Zeroizing::new)
    }

    /// Builds a cipher if any passphrase source is set.
    pub fn cipher(&self, explicit: Option<&str>) -> Result<Option<MessageCipher>> {
        match self.resolve_passphrase(explicit) {
            Some(passphrase) => Ok(Some(MessageCipher::new(passphrase.as_str())?)),
            None => Ok(None),
        }
    }

    /// Builds a cipher, failing when no passphrase is configured.
    pub fn require_cipher(&self, explicit: Option<&str>) -> Result<MessageCipher> {
        self.cipher(explicit)?.ok_or_else(|| {
            ConfigError::MissingPassphrase {
                env_var: self.cipher.passphrase_env.clone(),
            }
            .into()
        })
    }
}

/// Generates a template configuration file at the given path.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow::anyhow!("config file already exists: {}", path.display()).into());
    }

    let body = toml::to_string_pretty(&Config::default())
        .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;

    let template = format!(
        "# chat-cipher configuration\n\
         #\n\
         # The passphrase must match the chat backend. Keep it out of this file\n\
         # and export ${DEFAULT_PASSPHRASE_ENV} instead, or uncomment below.\n\n\
         {body}\
         # passphrase = \"...\"\n"
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, template)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cipher.passphrase_env, DEFAULT_PASSPHRASE_ENV);
    }

    #[test]
    fn parses_cipher_section() {
        let config = parse_config(
            r#"
            [cipher]
            passphrase = "from-file"
            passphrase_env = "MY_CHAT_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(config.cipher.passphrase.as_deref(), Some("from-file"));
        assert_eq!(config.cipher.passphrase_env, "MY_CHAT_KEY");
    }

    #[test]
    fn rejects_empty_passphrase() {
        let result = parse_config("[cipher]\npassphrase = \"\"\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::Validation { .. }))
        ));
    }

    #[test]
    fn rejects_bad_env_name() {
        let result = parse_config("[cipher]\npassphrase_env = \"A=B\"\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::Validation { .. }))
        ));
    }

    #[test]
    fn rejects_invalid_toml() {
        let result = parse_config("[cipher\n");
        assert!(matches!(result, Err(Error::Config(ConfigError::Parse { .. }))));
    }

    #[test]
    fn passphrase_priority() {
        let config = Config {
            cipher: CipherSettings {
                passphrase: Some("file".into()),
                passphrase_env: "KEY_VAR".into(),
            },
        };
        let env = |name: &str| (name == "KEY_VAR").then(|| "env".to_string());

        let explicit = config.resolve_with(Some("flag"), env).unwrap();
        assert_eq!(explicit.as_str(), "flag");

        let from_env = config.resolve_with(None, env).unwrap();
        assert_eq!(from_env.as_str(), "env");

        let from_file = config.resolve_with(None, no_env).unwrap();
        assert_eq!(from_file.as_str(), "file");
    }

    #[test]
    fn nothing_configured_means_no_passphrase() {
        assert!(Config::default().resolve_with(None, no_env).is_none());
        assert!(Config::default().resolve_with(Some(""), no_env).is_none());
    }

    #[test]
    fn empty_env_value_falls_through_to_file() {
        let config = Config {
            cipher: CipherSettings {
                passphrase: Some("file".into()),
                ..CipherSettings::default()
            },
        };
        let resolved = config.resolve_with(None, |_: &str| Some(String::new())).unwrap();
        assert_eq!(resolved.as_str(), "file");
    }

    #[test]
    fn debug_hides_passphrase() {
        let settings = CipherSettings {
            passphrase: Some("hunter2".into()),
            ..CipherSettings::default()
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn init_writes_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chat-cipher.toml");

        init_config(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains(DEFAULT_PASSPHRASE_ENV));

        let config = load_config_from(&path).unwrap();
        assert!(config.cipher.passphrase.is_none());

        assert!(init_config(&path).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat-cipher.toml");
        std::fs::write(&path, "[cipher]\npassphrase = \"s3cret\"\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert!(config.require_cipher(Some("override")).is_ok());
        assert_eq!(
            config.resolve_with(None, no_env).unwrap().as_str(),
            "s3cret"
        );
    }
}
