//! # Sealed Messages
//!
//! Caller-side wrapper around [`MessageCipher`]. When no passphrase is
//! configured or the platform has no secure randomness, messages travel as
//! plaintext, but always tagged as such: a [`Sealed`] value says which of the
//! two it carries, so ciphertext is never mistaken for a message body or the
//! other way around.
//!
//! Serialized form:
//!
//! ```text
//! {"kind":"encrypted","body":"<base64 blob>"}
//! {"kind":"plain","body":"hello"}
//! ```

use crate::crypto::{self, MessageCipher};
use crate::error::{CipherError, Result};
use serde::{Deserialize, Serialize};

/// A chat message body, either encrypted or deliberately left in the clear.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum Sealed {
    Encrypted(String),
    Plain(String),
}

impl Sealed {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Sealed::Encrypted(_))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json.trim())?)
    }
}

/// Encrypts outgoing and decrypts incoming chat messages.
#[derive(Debug)]
pub struct ChatEncryption {
    cipher: Option<MessageCipher>,
}

impl ChatEncryption {
    pub fn new(cipher: Option<MessageCipher>) -> Self {
        Self { cipher }
    }

    /// True when messages will actually be encrypted.
    pub fn is_supported(&self) -> bool {
        self.cipher.is_some() && crypto::is_available()
    }

    /// Prepares a message for sending.
    ///
    /// Falls back to [`Sealed::Plain`] only when encryption is unsupported.
    /// Failures of an available cipher are returned, never downgraded.
    pub fn seal(&self, message: &str) -> Result<Sealed> {
        let cipher = match &self.cipher {
            Some(cipher) if crypto::is_available() => cipher,
            Some(_) => {
                tracing::warn!("encryption is not available in this environment, sending plaintext");
                return Ok(Sealed::Plain(message.to_string()));
            }
            None => {
                tracing::warn!("no passphrase configured, sending plaintext");
                return Ok(Sealed::Plain(message.to_string()));
            }
        };

        match cipher.encrypt(message) {
            Ok(blob) => Ok(Sealed::Encrypted(blob)),
            Err(e) => {
                tracing::error!("failed to encrypt message: {e}");
                Err(e.into())
            }
        }
    }

    /// Recovers the message text from a received value.
    pub fn open(&self, sealed: &Sealed) -> Result<String> {
        let blob = match sealed {
            Sealed::Plain(text) => return Ok(text.clone()),
            Sealed::Encrypted(blob) => blob,
        };

        let cipher = match &self.cipher {
            Some(cipher) if crypto::is_available() => cipher,
            _ => {
                tracing::warn!("received an encrypted message but decryption is not available");
                return Err(CipherError::Encryption(
                    "decryption unavailable: no passphrase configured or no secure randomness"
                        .into(),
                )
                .into());
            }
        };

        cipher.decrypt(blob).map_err(|e| {
            tracing::error!("failed to decrypt message: {e}");
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn enabled() -> ChatEncryption {
        ChatEncryption::new(Some(MessageCipher::new("chat-secret").unwrap()))
    }

    #[test]
    fn seal_then_open() {
        let chat = enabled();
        assert!(chat.is_supported());

        let sealed = chat.seal("see you at 8").unwrap();
        assert!(sealed.is_encrypted());
        assert_eq!(chat.open(&sealed).unwrap(), "see you at 8");
    }

    #[test]
    fn without_cipher_messages_stay_plain() {
        let chat = ChatEncryption::new(None);
        assert!(!chat.is_supported());

        let sealed = chat.seal("hi").unwrap();
        assert_eq!(sealed, Sealed::Plain("hi".into()));
        assert_eq!(chat.open(&sealed).unwrap(), "hi");
    }

    #[test]
    fn encrypted_message_without_cipher_is_an_error() {
        let sealed = enabled().seal("private").unwrap();
        let result = ChatEncryption::new(None).open(&sealed);
        assert!(matches!(
            result,
            Err(Error::Cipher(CipherError::Encryption(_)))
        ));
    }

    #[test]
    fn wrong_passphrase_surfaces_authentication_error() {
        let sealed = enabled().seal("private").unwrap();
        let other = ChatEncryption::new(Some(MessageCipher::new("other").unwrap()));
        assert!(matches!(
            other.open(&sealed),
            Err(Error::Cipher(CipherError::Authentication))
        ));
    }

    #[test]
    fn plain_bodies_pass_through_an_enabled_cipher() {
        let chat = enabled();
        let text = chat.open(&Sealed::Plain("legacy message".into())).unwrap();
        assert_eq!(text, "legacy message");
    }

    #[test]
    fn json_shape() {
        let json = Sealed::Plain("hello".into()).to_json().unwrap();
        assert_eq!(json, r#"{"kind":"plain","body":"hello"}"#);

        let parsed = Sealed::from_json(r#"{"kind":"encrypted","body":"AAAA"}"#).unwrap();
        assert_eq!(parsed, Sealed::Encrypted("AAAA".into()));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = Sealed::from_json(r#"{"kind":"rot13","body":"uryyb"}"#);
        assert!(matches!(result, Err(Error::Envelope(_))));
    }
}
