//! Cryptographic utilities for secure data handling.
//!
//! This module provides encryption and decryption utilities using XChaCha20-Poly1305,
//! a modern AEAD cipher suitable for encrypting sensitive data at rest, plus the
//! display-masking helpers used when secret values are surfaced to operators.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::crypto::{EncryptionKey, encrypt, decrypt};
//!
//! // Derive the process key from configured key material
//! let key = EncryptionKey::derive_from_master("a-long-configured-master-key")?;
//!
//! // Encrypt some data
//! let plaintext = b"sensitive credentials";
//! let ciphertext = encrypt(&key, plaintext)?;
//!
//! // Decrypt the data
//! let decrypted = decrypt(&key, &ciphertext)?;
//! assert_eq!(plaintext, decrypted.as_slice());
//! ```

mod cipher;
mod error;
mod key;
mod mask;

pub use cipher::{
    MIN_CIPHERTEXT_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE, decrypt, decrypt_json, encrypt,
    encrypt_json,
};
pub use error::{CryptoError, CryptoResult};
pub use key::EncryptionKey;
pub use mask::{MASK_KEEP_CHARS, MASK_PLACEHOLDER, is_masked_input, mask_value};
