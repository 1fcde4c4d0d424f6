// Credential Encryption Module
//
// Provider credentials are sealed with AES-256-GCM under SHA256(MASTER_ENCRYPTION_KEY).
// Format: base64(iv_16bytes || ciphertext || tag_16bytes)
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroize;

pub const IV_LENGTH: usize = 16;
pub const AUTH_TAG_LENGTH: usize = 16;
const KEY_LEN: usize = 32;

/// GCM with the 16-byte IV the backend uses instead of the usual 12.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    #[error("ciphertext too short: {len} bytes (need at least {min})")]
    TooShort { len: usize, min: usize },
    #[error("unable to authenticate data (wrong key or tampered ciphertext)")]
    Authentication,
    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8,
    #[error("encryption failed")]
    Encryption,
}

// ==================== MASTER KEY ====================
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; KEY_LEN],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

impl MasterKey {
    /// The backend never uses the passphrase directly, only its SHA-256 digest.
    pub fn derive(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm16 {
        Aes256Gcm16::new(GenericArray::from_slice(&self.key))
    }

    /// Encrypt plaintext → base64(iv || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut iv);

        let sealed = self
            .cipher()
            .encrypt(GenericArray::from_slice(&iv), plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        // sealed = ciphertext || tag
        let mut combined = Vec::with_capacity(IV_LENGTH + sealed.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&sealed);

        Ok(STANDARD.encode(combined))
    }

    /// Decrypt base64(iv || ciphertext || tag) → plaintext bytes
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<Vec<u8>, CryptoError> {
        let combined = STANDARD
            .decode(encrypted_b64.trim())
            .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;

        let min = IV_LENGTH + AUTH_TAG_LENGTH;
        if combined.len() < min {
            return Err(CryptoError::TooShort {
                len: combined.len(),
                min,
            });
        }

        let (iv, sealed) = combined.split_at(IV_LENGTH);
        self.cipher()
            .decrypt(GenericArray::from_slice(iv), sealed)
            .map_err(|_| CryptoError::Authentication)
    }

    pub fn decrypt_string(&self, encrypted_b64: &str) -> Result<String, CryptoError> {
        let bytes = self.decrypt(encrypted_b64)?;
        String::from_utf8(bytes).map_err(|_| CryptoError::InvalidUtf8)
    }
}
