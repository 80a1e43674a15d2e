//! # Message Cipher
//!
//! Passphrase-based AES-256-GCM encryption for chat messages. Each call draws a
//! fresh random salt and nonce, stretches the passphrase with
//! PBKDF2-HMAC-SHA256 and ships everything the receiver needs in one base64
//! string. The byte layout matches the chat backend exactly; neither field order
//! nor lengths may change.
//!
//! ## Wire format
//!
//! ```text
//! ┌─────────────┬──────────────┬──────────────────────────────────────┐
//! │  Salt (16B) │  Nonce (12B) │  Ciphertext + Auth Tag (16B suffix)  │
//! └─────────────┴──────────────┴──────────────────────────────────────┘
//!          base64 (standard alphabet, padded; padding optional on input)
//! ```

use crate::error::CipherError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Random salt mixed into key derivation, fresh per message.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// PBKDF2 rounds. Fixed by the backend's format.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Smallest decodable blob: header plus the tag of an empty message.
pub const MIN_BLOB_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

const KEY_LEN: usize = 32;

/// Standard alphabet that accepts blobs with or without `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

type CipherResult<T> = std::result::Result<T, CipherError>;

/// Returns true if the OS secure random generator can be read.
///
/// AES-GCM and PBKDF2 are compiled in, so randomness is the only capability
/// that can be missing at runtime.
pub fn is_available() -> bool {
    let mut probe = [0u8; 1];
    OsRng.try_fill_bytes(&mut probe).is_ok()
}

/// Encrypts a message, returning `base64(salt ‖ nonce ‖ ciphertext ‖ tag)`.
pub fn encrypt(plaintext: &str, passphrase: &str) -> CipherResult<String> {
    let blob = seal(plaintext.as_bytes(), passphrase, PBKDF2_ITERATIONS)?;
    Ok(STANDARD.encode(blob))
}

/// Decrypts a blob produced by [`encrypt`] (or by the backend).
///
/// Any tag mismatch is reported as [`CipherError::Authentication`] with no
/// further detail. Blobs that are not base64 or are too short to hold a tag
/// are [`CipherError::MalformedInput`].
pub fn decrypt(blob: &str, passphrase: &str) -> CipherResult<String> {
    into_text(open(blob, passphrase, PBKDF2_ITERATIONS)?)
}

/// Stretches a passphrase into a 256-bit AES key.
fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut *key);
    key
}

fn fill_random(buf: &mut [u8]) -> CipherResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CipherError::Encryption(format!("secure random generator unavailable: {e}")))
}

fn seal(plaintext: &[u8], passphrase: &str, iterations: u32) -> CipherResult<Vec<u8>> {
    if passphrase.is_empty() {
        return Err(CipherError::Encryption("passphrase must not be empty".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    seal_with(plaintext, passphrase, iterations, &salt, &nonce)
}

fn seal_with(
    plaintext: &[u8],
    passphrase: &str,
    iterations: u32,
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> CipherResult<Vec<u8>> {
    let key = derive_key(passphrase, salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CipherError::Encryption("AES-GCM encryption failed".into()))?;

    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(&ciphertext);

    tracing::debug!(
        plaintext_len = plaintext.len(),
        blob_len = output.len(),
        "message encrypted"
    );
    Ok(output)
}

fn open(blob: &str, passphrase: &str, iterations: u32) -> CipherResult<Zeroizing<Vec<u8>>> {
    let data = LENIENT
        .decode(blob.trim())
        .map_err(|e| CipherError::MalformedInput(format!("invalid base64: {e}")))?;

    if data.len() < MIN_BLOB_LEN {
        return Err(CipherError::MalformedInput(format!(
            "expected at least {MIN_BLOB_LEN} bytes, got {}",
            data.len()
        )));
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::Authentication)?;

    tracing::debug!(blob_len = data.len(), "message decrypted");
    Ok(Zeroizing::new(plaintext))
}

fn into_text(plaintext: Zeroizing<Vec<u8>>) -> CipherResult<String> {
    std::str::from_utf8(&plaintext)
        .map(str::to_owned)
        .map_err(|_| CipherError::MalformedInput("decrypted message is not valid UTF-8".into()))
}

/// A cipher bound to one configured passphrase.
///
/// The passphrase is wiped from memory on drop and never shows up in `Debug`
/// output.
pub struct MessageCipher {
    passphrase: Zeroizing<String>,
}

impl MessageCipher {
    pub fn new(passphrase: impl Into<String>) -> CipherResult<Self> {
        let passphrase = Zeroizing::new(passphrase.into());
        if passphrase.is_empty() {
            return Err(CipherError::Encryption("passphrase must not be empty".into()));
        }
        Ok(Self { passphrase })
    }

    pub fn encrypt(&self, plaintext: &str) -> CipherResult<String> {
        encrypt(plaintext, &self.passphrase)
    }

    pub fn decrypt(&self, blob: &str) -> CipherResult<String> {
        decrypt(blob, &self.passphrase)
    }
}

impl fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCipher")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
