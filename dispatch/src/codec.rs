//! Encryption codec for integration configuration blobs.
//!
//! Configs are encrypted with AES-256-GCM under a process-wide key before
//! they are persisted, and decrypted only at the point of use. The wire
//! shape is `base64(nonce || ciphertext || tag)` with a fresh random nonce
//! per encryption. A failed authentication tag is a hard error; the codec
//! never returns unauthenticated plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("encryption key must be {KEY_SIZE} bytes after base64 decoding")]
    InvalidKeyLength,

    #[error("encryption key is not valid base64")]
    InvalidKeyEncoding,

    #[error("encryption failed")]
    Encrypt,

    #[error("ciphertext is malformed or truncated")]
    Malformed,

    #[error("decryption failed (authentication error)")]
    Decrypt,

    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// AES-256-GCM codec holding the process-wide config key.
///
/// The key is read once at startup; construction fails fast if it is absent
/// or the wrong length.
#[derive(Clone)]
pub struct ConfigCodec {
    cipher: Aes256Gcm,
}

impl ConfigCodec {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        ConfigCodec {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    /// Builds a codec from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| CodecError::InvalidKeyEncoding)?;
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidKeyLength)?;
        Ok(ConfigCodec::new(key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CodecError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        let blob = BASE64.decode(encoded).map_err(|_| CodecError::Malformed)?;
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CodecError::Malformed);
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Decrypt)
    }

    /// Serializes `value` to JSON and encrypts it. Every integration config
    /// written to storage goes through here.
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let plaintext = serde_json::to_vec(value)?;
        self.encrypt(&plaintext)
    }

    /// Decrypts a blob and deserializes the contained JSON.
    pub fn decrypt_json<T: DeserializeOwned>(&self, encoded: &str) -> Result<T, CodecError> {
        let plaintext = self.decrypt(encoded)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}
