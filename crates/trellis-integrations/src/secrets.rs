//! Secret bundles and their encryption, masking, and merge semantics.
//!
//! A [`SecretBundle`] is the in-memory, never-persisted-in-plaintext map of
//! credential values one provider needs. Bundles are validated against the
//! registry's field list before use, encrypted into one opaque base64 string
//! for storage, and surfaced to operators only in masked form.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use trellis_core::crypto::{
    CryptoError, CryptoResult, EncryptionKey, MASK_KEEP_CHARS, decrypt_json, encrypt_json,
    is_masked_input, mask_value,
};

use crate::registry::{FieldType, IntegrationDefinition};

/// A single secret value: providers mix strings, numbers and flags in one
/// configuration form, so the bundle is loosely typed at this boundary.
/// Adapters convert bundles into strongly-typed per-provider structs before
/// any use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// String value (the common case).
    String(String),
}

impl SecretValue {
    /// Returns the string contents, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SecretValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the value the way a configuration form would display it.
    pub fn to_display_string(&self) -> String {
        match self {
            SecretValue::Bool(value) => value.to_string(),
            SecretValue::Number(value) => value.to_string(),
            SecretValue::String(value) => value.clone(),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        SecretValue::String(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue::String(value)
    }
}

impl From<bool> for SecretValue {
    fn from(value: bool) -> Self {
        SecretValue::Bool(value)
    }
}

impl From<f64> for SecretValue {
    fn from(value: f64) -> Self {
        SecretValue::Number(value)
    }
}

impl From<i64> for SecretValue {
    fn from(value: i64) -> Self {
        SecretValue::Number(value as f64)
    }
}

/// The credential/config values one provider's adapter needs, keyed by the
/// registry's field keys.
///
/// Any bundle round-trips through encrypt→decrypt with full fidelity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretBundle(BTreeMap<String, SecretValue>);

impl SecretBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SecretValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<SecretValue> {
        self.0.remove(key)
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.0.get(key)
    }

    /// Returns the trimmed string value for a key, treating empty strings as
    /// absent. Credential forms routinely carry stray whitespace; trimming
    /// here keeps every adapter consistent.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns whether the bundle has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SecretValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, SecretValue)> for SecretBundle {
    fn from_iter<T: IntoIterator<Item = (String, SecretValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encrypts and decrypts secret bundles into one opaque string.
///
/// The key is derived once from configured master key material and reused for
/// every call in the process; construct the cipher at startup and clone it
/// where needed.
#[derive(Clone)]
pub struct SecretCipher {
    key: EncryptionKey,
}

impl SecretCipher {
    /// Creates a cipher from an already-derived key.
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Creates a cipher by deriving the key from configured master key
    /// material.
    pub fn from_master(master: &str) -> CryptoResult<Self> {
        Ok(Self {
            key: EncryptionKey::derive_from_master(master)?,
        })
    }

    /// Encrypts a bundle into one base64 envelope string.
    pub fn encrypt(&self, bundle: &SecretBundle) -> CryptoResult<String> {
        let envelope = encrypt_json(&self.key, bundle)?;
        Ok(BASE64_STANDARD.encode(envelope))
    }

    /// Decrypts an envelope string back into a bundle.
    ///
    /// An empty string is the defined representation of "no secrets yet" and
    /// decrypts to an empty bundle. Malformed or tampered input fails with a
    /// [`CryptoError`]; callers must treat that as "secrets unusable", never
    /// as "logically no secrets".
    pub fn decrypt(&self, encoded: &str) -> CryptoResult<SecretBundle> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Ok(SecretBundle::default());
        }

        let envelope = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidEncoding)?;
        decrypt_json(&self.key, &envelope)
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

/// Produces the display view of a bundle for the administration UI.
///
/// Only `Password`-typed fields are masked. `Secret`-typed fields (webhook
/// secrets the operator must copy verbatim) pass through unmasked, and every
/// other field is returned raw so the UI never round-trips a masked value
/// back into storage for fields that are not actually secrets.
pub fn masked_bundle(
    definition: &IntegrationDefinition,
    bundle: &SecretBundle,
) -> BTreeMap<String, String> {
    bundle
        .iter()
        .map(|(key, value)| {
            let display = match definition.field_type(key) {
                Some(FieldType::Password) => match value.as_str() {
                    Some(text) => mask_value(text, MASK_KEEP_CHARS),
                    None => value.to_display_string(),
                },
                _ => value.to_display_string(),
            };
            (key.clone(), display)
        })
        .collect()
}

/// Returns the unmasked copy-only webhook secret of a bundle, if the
/// provider's schema declares one and a value is stored.
pub fn webhook_secret_value(
    definition: &IntegrationDefinition,
    bundle: &SecretBundle,
) -> Option<String> {
    definition
        .config_fields
        .iter()
        .filter(|field| field.field_type == FieldType::Secret)
        .find_map(|field| bundle.get_str(field.key))
        .map(str::to_string)
}

/// Merges an incoming save over the previously stored bundle.
///
/// Configuration forms echo stored values back masked (`••••••1234`) or
/// empty; persisting those verbatim would destroy the credential. For every
/// stored key whose incoming value is missing, empty, or masked, the stored
/// plaintext wins. Freshly entered values always replace.
pub fn merge_for_save(incoming: SecretBundle, existing: Option<&SecretBundle>) -> SecretBundle {
    let mut merged = incoming;

    let Some(existing) = existing else {
        return merged;
    };

    for (key, existing_value) in existing.iter() {
        let keep_existing = match merged.get(key) {
            None => true,
            Some(SecretValue::String(value)) => {
                value.trim().is_empty() || is_masked_input(value)
            }
            Some(_) => false,
        };

        if keep_existing {
            merged.insert(key.clone(), existing_value.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use trellis_postgres::types::IntegrationProvider;

    use super::*;
    use crate::registry;

    fn cipher() -> SecretCipher {
        SecretCipher::new(EncryptionKey::generate())
    }

    fn email_bundle() -> SecretBundle {
        let mut bundle = SecretBundle::new();
        bundle.insert("provider", "resend");
        bundle.insert("api_key", "sk_x");
        bundle.insert("from_email", "a@b.com");
        bundle
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let bundle = email_bundle();

        let encoded = cipher.encrypt(&bundle).unwrap();
        let decoded = cipher.decrypt(&encoded).unwrap();

        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_roundtrip_preserves_value_types() {
        let cipher = cipher();
        let mut bundle = SecretBundle::new();
        bundle.insert("name", "value with spaces and unicode ✓");
        bundle.insert("port", 2525i64);
        bundle.insert("secure", true);
        bundle.insert("empty", "");

        let decoded = cipher.decrypt(&cipher.encrypt(&bundle).unwrap()).unwrap();
        assert_eq!(decoded, bundle);
        assert_eq!(decoded.get("secure"), Some(&SecretValue::Bool(true)));
        assert_eq!(decoded.get("port"), Some(&SecretValue::Number(2525.0)));
    }

    #[test]
    fn test_decrypt_empty_string_is_empty_bundle() {
        let cipher = cipher();
        let bundle = cipher.decrypt("").unwrap();
        assert!(bundle.is_empty());

        let bundle = cipher.decrypt("   ").unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_roundtrip_empty_bundle() {
        let cipher = cipher();
        let encoded = cipher.encrypt(&SecretBundle::default()).unwrap();
        assert!(!encoded.is_empty());
        assert!(cipher.decrypt(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_decrypt_tampered_envelope_fails() {
        let cipher = cipher();
        let encoded = cipher.encrypt(&email_bundle()).unwrap();

        let mut raw = BASE64_STANDARD.decode(&encoded).unwrap();
        let last = raw.last_mut().unwrap();
        *last ^= 0xAA;
        let tampered = BASE64_STANDARD.encode(raw);

        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_decrypt_garbage_fails_without_partial_bundle() {
        let cipher = cipher();

        assert!(matches!(
            cipher.decrypt("not base64 at all!!"),
            Err(CryptoError::InvalidEncoding)
        ));
        assert!(matches!(
            cipher.decrypt(&BASE64_STANDARD.encode(b"short")),
            Err(CryptoError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let encoded = cipher().encrypt(&email_bundle()).unwrap();
        let other = cipher();

        assert!(matches!(
            other.decrypt(&encoded),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_masked_bundle_masks_password_fields_only() {
        let definition = registry::describe(IntegrationProvider::Email);
        let mut bundle = email_bundle();
        bundle.insert("api_key", "sk_live_secret_1234");

        let masked = masked_bundle(definition, &bundle);

        let api_key = masked.get("api_key").unwrap();
        assert!(api_key.starts_with("••••••"));
        assert!(api_key.ends_with("1234"));
        assert!(!api_key.contains("sk_live"));

        // Non-secret fields stay raw so the UI can echo them back safely
        assert_eq!(masked.get("from_email").unwrap(), "a@b.com");
        assert_eq!(masked.get("provider").unwrap(), "resend");
    }

    #[test]
    fn test_webhook_secret_is_exempt_from_masking() {
        let definition = registry::describe(IntegrationProvider::VoipmsSms);
        let mut bundle = SecretBundle::new();
        bundle.insert("username", "tenant_user");
        bundle.insert("api_password", "api-pass-123");
        bundle.insert("default_did", "5551234567");
        bundle.insert("webhook_secret", "https://app.example.com/api/webhooks/voipms");

        let masked = masked_bundle(definition, &bundle);
        assert_eq!(
            masked.get("webhook_secret").unwrap(),
            "https://app.example.com/api/webhooks/voipms"
        );

        assert_eq!(
            webhook_secret_value(definition, &bundle).as_deref(),
            Some("https://app.example.com/api/webhooks/voipms")
        );
    }

    #[test]
    fn test_merge_keeps_stored_value_for_masked_input() {
        let mut existing = SecretBundle::new();
        existing.insert("api_key", "sk_live_secret_1234");
        existing.insert("from_email", "a@b.com");

        let mut incoming = SecretBundle::new();
        incoming.insert("api_key", "••••••1234");
        incoming.insert("from_email", "new@b.com");

        let merged = merge_for_save(incoming, Some(&existing));

        assert_eq!(merged.get_str("api_key"), Some("sk_live_secret_1234"));
        assert_eq!(merged.get_str("from_email"), Some("new@b.com"));
    }

    #[test]
    fn test_merge_keeps_stored_value_for_empty_input() {
        let mut existing = SecretBundle::new();
        existing.insert("api_key", "sk_live_secret_1234");

        let mut incoming = SecretBundle::new();
        incoming.insert("api_key", "");
        incoming.insert("reply_to", "ops@b.com");

        let merged = merge_for_save(incoming, Some(&existing));

        assert_eq!(merged.get_str("api_key"), Some("sk_live_secret_1234"));
        assert_eq!(merged.get_str("reply_to"), Some("ops@b.com"));
    }

    #[test]
    fn test_merge_without_existing_passes_through() {
        let merged = merge_for_save(email_bundle(), None);
        assert_eq!(merged, email_bundle());
    }
}
