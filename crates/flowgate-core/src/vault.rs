// crates/flowgate-core/src/vault.rs
// ============================================================================
// Module: Flowgate Secret Vault
// Description: AES-256-GCM encryption of credential blobs.
// Purpose: Keep provider credentials opaque everywhere outside a live call.
// Dependencies: aes-gcm, base64, rand, serde, serde_json
// ============================================================================

//! ## Overview
//! The vault wraps one process-wide AES-256-GCM key loaded at startup.
//! [`SecretVault::encrypt_value`] serializes a struct to JSON and seals it
//! under a fresh random nonce; the stored form is `base64(nonce || ciphertext)`
//! and stays opaque to the store. Decryption authenticates before parsing.
//! When no key is configured, construction fails and all secret writes fail
//! closed with it.
//!
//! Security posture: ciphertext integrity is enforced by the GCM tag; a wrong
//! key or tampered blob yields [`VaultError::Decrypt`], never partial data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use aes_gcm::aead::KeyInit;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// AES-256 key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// AES-GCM nonce length in bytes.
const NONCE_LENGTH: usize = 12;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Vault failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - [`VaultError::Decrypt`] carries no detail about why authentication
///   failed.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The configured key is missing or has the wrong length.
    #[error("vault key must be {KEY_LENGTH} bytes")]
    InvalidKey,
    /// Plaintext serialization failed.
    #[error("vault serialization failure: {0}")]
    Serialization(String),
    /// Encryption failed.
    #[error("vault encryption failure")]
    Encrypt,
    /// The blob is not valid base64 or is too short to carry a nonce.
    #[error("vault blob encoding is invalid")]
    Encoding,
    /// Authentication or decryption failed.
    #[error("vault decryption failure")]
    Decrypt,
}

// ============================================================================
// SECTION: Vault
// ============================================================================

/// Process-wide symmetric vault for credential blobs.
///
/// # Invariants
/// - Every encryption uses a fresh random nonce; identical plaintexts never
///   produce identical blobs.
pub struct SecretVault {
    /// The GCM cipher initialized from the process key.
    cipher: Aes256Gcm,
}

impl SecretVault {
    /// Creates a vault from a raw 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] when the key length is wrong.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_LENGTH {
            return Err(VaultError::InvalidKey);
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        })
    }

    /// Creates a vault from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKey`] when decoding fails or the decoded
    /// key length is wrong.
    pub fn from_base64_key(encoded: &str) -> Result<Self, VaultError> {
        let key = BASE64.decode(encoded.trim()).map_err(|_| VaultError::InvalidKey)?;
        Self::from_key_bytes(&key)
    }

    /// Serializes `value` to JSON and seals it under a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] when serialization or encryption fails.
    pub fn encrypt_value<T: Serialize>(&self, value: &T) -> Result<String, VaultError> {
        let plaintext =
            serde_json::to_vec(value).map_err(|err| VaultError::Serialization(err.to_string()))?;
        let mut nonce_bytes = [0_u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext =
            self.cipher.encrypt(nonce, plaintext.as_slice()).map_err(|_| VaultError::Encrypt)?;
        let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Opens a blob produced by [`SecretVault::encrypt_value`] and parses the
    /// plaintext JSON.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] when decoding, authentication, or parsing
    /// fails.
    pub fn decrypt_value<T: DeserializeOwned>(&self, blob: &str) -> Result<T, VaultError> {
        let raw = BASE64.decode(blob.trim()).map_err(|_| VaultError::Encoding)?;
        if raw.len() <= NONCE_LENGTH {
            return Err(VaultError::Encoding);
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LENGTH);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self.cipher.decrypt(nonce, ciphertext).map_err(|_| VaultError::Decrypt)?;
        serde_json::from_slice(&plaintext).map_err(|_| VaultError::Decrypt)
    }
}
