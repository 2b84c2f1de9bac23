//! Encryption key management.

use std::fmt;

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use super::error::{CryptoError, CryptoResult};

/// The size of an XChaCha20-Poly1305 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Domain separation string for deriving the secrets key from master key material.
const SECRETS_KEY_INFO: &[u8] = b"trellis-integration-secrets-key-v1";

/// A 256-bit encryption key for XChaCha20-Poly1305.
///
/// This type wraps the raw key bytes and provides safe construction methods.
/// The key is stored in memory and should be handled carefully to avoid leaks.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a new encryption key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self { bytes })
    }

    /// Generates a new random encryption key using a cryptographically secure RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Derives the process-wide secrets encryption key from configured master
    /// key material using HKDF-SHA256.
    ///
    /// The derivation is deterministic: the same master string always yields
    /// the same key, so the key is derived once at startup and reused for
    /// every encrypt/decrypt call in the process.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidMasterKey`] if the master string is empty.
    pub fn derive_from_master(master: &str) -> CryptoResult<Self> {
        let master = master.trim();
        if master.is_empty() {
            return Err(CryptoError::InvalidMasterKey(
                "master key must not be empty".to_string(),
            ));
        }
        if master.len() < 32 {
            tracing::warn!(
                target: "trellis_core::crypto",
                "master key is shorter than 32 bytes; use a longer key in production"
            );
        }

        let hkdf = Hkdf::<Sha256>::new(None, master.as_bytes());

        let mut derived_key = [0u8; KEY_SIZE];
        hkdf.expand(SECRETS_KEY_INFO, &mut derived_key)
            .expect("HKDF expand should not fail for 32-byte output");

        Ok(Self { bytes: derived_key })
    }

    /// Returns the raw key bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Consumes the key and returns the raw bytes.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> [u8; KEY_SIZE] {
        self.bytes
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl TryFrom<&[u8]> for EncryptionKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<Vec<u8>> for EncryptionKey {
    type Error = CryptoError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(&bytes)
    }
}

impl AsRef<[u8]> for EncryptionKey {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
