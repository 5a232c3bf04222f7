//! Encryption of stored connection passwords.
//!
//! Values are sealed with ChaCha20-Poly1305 into the envelope
//! `enc:v1:{nonce}:{ciphertext}` (both URL-safe base64 without padding).
//! Keys are derived from configured key strings with SHA-256. The first key
//! encrypts; every key is tried when decrypting so old keys can be rotated out.

use crate::error::{PokerError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chacha20poly1305::aead::{Aead, AeadCore, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use sha2::{Digest, Sha256};
use std::fmt;

const ENVELOPE_PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;

/// Cipher for password columns.
#[derive(Clone)]
pub struct FieldCipher {
    keys: Vec<Key>,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl FieldCipher {
    /// Build a cipher from key strings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PokerError::Secret` if no non-empty key is given.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<Key> = keys
            .into_iter()
            .filter(|k| !k.as_ref().trim().is_empty())
            .map(|k| derive_key(k.as_ref()))
            .collect();
        if keys.is_empty() {
            return Err(PokerError::Secret(
                "no encryption key configured (set secret-key or field-encryption-keys)"
                    .to_string(),
            ));
        }
        Ok(Self { keys })
    }

    /// Encrypt a plaintext value into an envelope.
    ///
    /// # Errors
    ///
    /// Returns `PokerError::Secret` if the AEAD fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let aead = ChaCha20Poly1305::new(&self.keys[0]);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| PokerError::Secret(format!("failed to encrypt value: {e}")))?;
        Ok(format!(
            "{ENVELOPE_PREFIX}{}:{}",
            URL_SAFE_NO_PAD.encode(nonce),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// Decrypt a stored value. Values without the envelope prefix are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `PokerError::Secret` if the envelope is malformed or no
    /// configured key opens it.
    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(rest) = stored.strip_prefix(ENVELOPE_PREFIX) else {
            return Ok(stored.to_string());
        };
        let (nonce_b64, ciphertext_b64) = rest
            .split_once(':')
            .ok_or_else(|| PokerError::Secret("stored secret envelope is invalid".to_string()))?;

        let nonce_raw = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .map_err(|e| PokerError::Secret(format!("failed to decode nonce: {e}")))?;
        if nonce_raw.len() != NONCE_LEN {
            return Err(PokerError::Secret(
                "stored secret nonce length is invalid".to_string(),
            ));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64)
            .map_err(|e| PokerError::Secret(format!("failed to decode payload: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_raw);

        let plaintext = self
            .keys
            .iter()
            .find_map(|key| {
                ChaCha20Poly1305::new(key)
                    .decrypt(nonce, ciphertext.as_slice())
                    .ok()
            })
            .ok_or_else(|| {
                PokerError::Secret("no configured key can decrypt the stored secret".to_string())
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| PokerError::Secret(format!("decrypted secret is not UTF-8: {e}")))
    }
}

/// Whether a stored value is an encryption envelope.
#[must_use]
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENVELOPE_PREFIX)
}

/// Generate a fresh random key string for `secret-key`.
#[must_use]
pub fn generate_secret_key() -> String {
    URL_SAFE_NO_PAD.encode(ChaCha20Poly1305::generate_key(&mut OsRng))
}

fn derive_key(secret: &str) -> Key {
    let digest = Sha256::digest(secret.as_bytes());
    *Key::from_slice(&digest)
}
