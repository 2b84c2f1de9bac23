//! Connection store: encrypted per-tenant provider credentials.
//!
//! The store owns everything between a submitted configuration form and the
//! persisted row: masked-input merging, provider-specific normalization,
//! webhook-secret provisioning, registry validation, encryption, and the
//! atomic upsert. Reads decrypt at the boundary and fail closed: a record
//! that cannot be decrypted behaves as "not configured" so business logic
//! never mistakes corrupted secrets for a live connection.

use std::future::Future;

use rand::RngCore;
use serde_json::Value;
use trellis_core::{Error, Result};
use trellis_postgres::model::{
    IntegrationConnection, NewIntegrationConnection, UpdateIntegrationConnection,
};
use trellis_postgres::query::IntegrationConnectionRepository;
use trellis_postgres::types::IntegrationProvider;
use trellis_postgres::{PgClient, PgError};
use url::Url;
use uuid::Uuid;

use crate::TRACING_TARGET_STORE;
use crate::providers::normalize_nanp_digits;
use crate::registry;
use crate::secrets::{SecretBundle, SecretCipher, merge_for_save};

/// Persistence seam for integration connections.
///
/// The store and health manager talk to persistence exclusively through this
/// trait: the Postgres client implements it for production, and an in-memory
/// backend stands in for tests. Implementations must provide atomic upsert
/// semantics per `(tenant, provider)` key.
pub trait ConnectionBackend: Clone + Send + Sync {
    /// Finds the connection for a tenant and provider.
    fn find(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> impl Future<Output = Result<Option<IntegrationConnection>>> + Send;

    /// Lists all connections for a tenant, newest first.
    fn list(
        &self,
        tenant: Uuid,
    ) -> impl Future<Output = Result<Vec<IntegrationConnection>>> + Send;

    /// Atomically inserts or updates the connection for its
    /// `(tenant, provider)` key; last write wins.
    fn upsert(
        &self,
        connection: NewIntegrationConnection,
    ) -> impl Future<Output = Result<IntegrationConnection>> + Send;

    /// Applies a changeset; returns `None` when no row exists.
    fn update(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
        changes: UpdateIntegrationConnection,
    ) -> impl Future<Output = Result<Option<IntegrationConnection>>> + Send;

    /// Clears secrets and resets the connection to `NotConfigured`;
    /// returns `None` when no row exists.
    fn disconnect(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> impl Future<Output = Result<Option<IntegrationConnection>>> + Send;
}

fn backend_error(error: PgError) -> Error {
    Error::internal()
        .with_message("connection storage operation failed")
        .with_source(error)
}

impl ConnectionBackend for PgClient {
    async fn find(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<IntegrationConnection>> {
        let mut conn = self.get_connection().await.map_err(backend_error)?;
        conn.find_connection(tenant, provider)
            .await
            .map_err(backend_error)
    }

    async fn list(&self, tenant: Uuid) -> Result<Vec<IntegrationConnection>> {
        let mut conn = self.get_connection().await.map_err(backend_error)?;
        conn.list_connections(tenant).await.map_err(backend_error)
    }

    async fn upsert(
        &self,
        connection: NewIntegrationConnection,
    ) -> Result<IntegrationConnection> {
        let mut conn = self.get_connection().await.map_err(backend_error)?;
        conn.upsert_connection(connection)
            .await
            .map_err(backend_error)
    }

    async fn update(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
        changes: UpdateIntegrationConnection,
    ) -> Result<Option<IntegrationConnection>> {
        let mut conn = self.get_connection().await.map_err(backend_error)?;
        conn.update_connection(tenant, provider, changes)
            .await
            .map_err(backend_error)
    }

    async fn disconnect(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<IntegrationConnection>> {
        let mut conn = self.get_connection().await.map_err(backend_error)?;
        conn.disconnect_connection(tenant, provider, jiff::Timestamp::now().into())
            .await
            .map_err(backend_error)
    }
}

/// Persistence and retrieval of encrypted secrets per `(tenant, provider)`.
#[derive(Debug, Clone)]
pub struct ConnectionStore<B> {
    backend: B,
    cipher: SecretCipher,
    public_base_url: Option<Url>,
}

impl<B: ConnectionBackend> ConnectionStore<B> {
    /// Creates a store over a backend and cipher.
    pub fn new(backend: B, cipher: SecretCipher) -> Self {
        Self {
            backend,
            cipher,
            public_base_url: None,
        }
    }

    /// Sets the public base URL used to provision webhook URLs.
    #[must_use]
    pub fn with_public_base_url(mut self, url: Url) -> Self {
        self.public_base_url = Some(url);
        self
    }

    /// Returns the backend for components that share it.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the cipher for components that share it.
    pub fn cipher(&self) -> &SecretCipher {
        &self.cipher
    }

    /// Returns the host of the public base URL, for media-URL rewriting.
    pub fn public_host(&self) -> Option<&str> {
        self.public_base_url.as_ref().and_then(Url::host_str)
    }

    /// Returns the stored connection record, if any.
    pub async fn get(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<IntegrationConnection>> {
        self.backend.find(tenant, provider).await
    }

    /// Lists a tenant's connections, newest first.
    pub async fn list(&self, tenant: Uuid) -> Result<Vec<IntegrationConnection>> {
        self.backend.list(tenant).await
    }

    /// Saves a configuration submission for `(tenant, provider)`.
    ///
    /// The incoming bundle is merged over the stored one (masked or empty
    /// inputs keep the stored value), normalized, topped up with
    /// auto-provisioned webhook secrets, validated against the registry,
    /// encrypted, and upserted. The metadata patch merges into existing
    /// metadata with new keys winning. Status and last-error are never
    /// touched here; health transitions are the health manager's single
    /// write path, invoked by the caller after a save.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_STORE, fields(%tenant, provider = %provider))]
    pub async fn save(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
        incoming: SecretBundle,
        display_name: Option<String>,
        metadata_patch: Option<Value>,
    ) -> Result<IntegrationConnection> {
        let definition = registry::describe(provider);
        let existing = self.backend.find(tenant, provider).await?;

        let existing_bundle = existing.as_ref().and_then(|connection| {
            if !connection.has_secrets() {
                return None;
            }
            match self.cipher.decrypt(&connection.encrypted_secrets) {
                Ok(bundle) => Some(bundle),
                Err(_) => {
                    // Without a readable stored bundle there is nothing to
                    // merge; the save still proceeds with the incoming values
                    tracing::warn!(
                        target: TRACING_TARGET_STORE,
                        provider = %provider,
                        "Stored secrets are unreadable; saving incoming values without merge"
                    );
                    None
                }
            }
        });

        let mut merged = merge_for_save(incoming, existing_bundle.as_ref());
        self.normalize(provider, &mut merged);
        self.provision_webhook_secrets(provider, &mut merged);

        definition.validate_required(&merged)?;

        let metadata = merge_metadata(
            existing.as_ref().map(|connection| &connection.metadata),
            metadata_patch,
        );

        let encrypted_secrets = self.cipher.encrypt(&merged).map_err(|error| {
            Error::crypto()
                .with_message("failed to encrypt secrets")
                .with_source(error)
        })?;

        let display_name =
            display_name.or_else(|| existing.as_ref().and_then(|c| c.display_name.clone()));

        let connection = self
            .backend
            .upsert(NewIntegrationConnection {
                tenant_id: tenant,
                provider,
                display_name,
                encrypted_secrets,
                metadata,
            })
            .await?;

        tracing::info!(
            target: TRACING_TARGET_STORE,
            connection_id = %connection.id,
            provider = %provider,
            "Integration configuration saved"
        );

        Ok(connection)
    }

    /// Returns the decrypted secrets for `(tenant, provider)`.
    ///
    /// Decryption failures are logged and reported as `None` rather than
    /// propagated: a corrupted secret must never be mistaken for "configured
    /// but currently erroring", and one corrupted record must not block other
    /// store operations.
    pub async fn get_secrets(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<SecretBundle>> {
        let Some(connection) = self.backend.find(tenant, provider).await? else {
            return Ok(None);
        };
        if !connection.has_secrets() {
            return Ok(None);
        }

        let mut bundle = match self.cipher.decrypt(&connection.encrypted_secrets) {
            Ok(bundle) => bundle,
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET_STORE,
                    provider = %provider,
                    error = %error,
                    "Failed to decrypt stored secrets; treating connection as not configured"
                );
                return Ok(None);
            }
        };

        // Legacy rows may carry a formatted DID saved before normalization
        // moved into the save path
        if provider == IntegrationProvider::VoipmsSms
            && let Some(did) = bundle.get_str("default_did")
        {
            let normalized = normalize_nanp_digits(did);
            bundle.insert("default_did", normalized);
        }

        Ok(Some(bundle))
    }

    /// Clears stored secrets and resets the connection to `NotConfigured`.
    pub async fn disconnect(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<IntegrationConnection>> {
        let disconnected = self.backend.disconnect(tenant, provider).await?;
        if disconnected.is_some() {
            tracing::info!(
                target: TRACING_TARGET_STORE,
                provider = %provider,
                "Integration disconnected"
            );
        }
        Ok(disconnected)
    }

    /// Rotates the provider's webhook secret and returns the plaintext once.
    ///
    /// The fresh value is persisted encrypted and never displayed again;
    /// operators must copy it from this one response.
    pub async fn regenerate_webhook_secret(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<String> {
        if !provider.has_webhook_secret() {
            return Err(Error::configuration()
                .with_message("Secret regeneration not supported for this provider"));
        }

        let Some(connection) = self.backend.find(tenant, provider).await? else {
            return Err(
                Error::not_connected().with_message("Integration not found or not configured")
            );
        };
        if !connection.has_secrets() {
            return Err(
                Error::not_connected().with_message("Integration not found or not configured")
            );
        }

        let mut bundle = self
            .cipher
            .decrypt(&connection.encrypted_secrets)
            .map_err(|error| {
                Error::crypto()
                    .with_message("stored secrets are unreadable")
                    .with_source(error)
            })?;

        let new_secret = match provider {
            // VoIP.ms wants the full webhook URL in its dashboard
            IntegrationProvider::VoipmsSms => self.voipms_webhook_url()?,
            _ => random_webhook_secret(),
        };
        bundle.insert("webhook_secret", new_secret.clone());

        if provider == IntegrationProvider::Whatsapp
            && bundle.get_str("provider") == Some("meta")
        {
            bundle.insert("meta_verify_token", random_webhook_secret());
        }

        let encrypted_secrets = self.cipher.encrypt(&bundle).map_err(|error| {
            Error::crypto()
                .with_message("failed to encrypt secrets")
                .with_source(error)
        })?;

        let now: jiff_diesel::Timestamp = jiff::Timestamp::now().into();
        self.backend
            .update(
                tenant,
                provider,
                UpdateIntegrationConnection {
                    encrypted_secrets: Some(encrypted_secrets),
                    last_error: Some(None),
                    last_checked_at: Some(Some(now)),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            target: TRACING_TARGET_STORE,
            provider = %provider,
            "Webhook secret regenerated"
        );

        Ok(new_secret)
    }

    /// Provider-specific cleanup of submitted values.
    fn normalize(&self, provider: IntegrationProvider, bundle: &mut SecretBundle) {
        if provider == IntegrationProvider::VoipmsSms {
            for key in ["username", "api_password"] {
                if let Some(value) = bundle.get_str(key) {
                    let trimmed = value.to_string();
                    bundle.insert(key, trimmed);
                }
            }
            if let Some(did) = bundle.get_str("default_did") {
                let normalized = normalize_nanp_digits(did);
                bundle.insert("default_did", normalized);
            }
        }
    }

    /// Auto-provisions webhook secrets the tenant cannot reasonably type in.
    fn provision_webhook_secrets(&self, provider: IntegrationProvider, bundle: &mut SecretBundle) {
        match provider {
            IntegrationProvider::VoipmsSms => {
                // VoIP.ms expects the full webhook URL; old rows may carry a
                // bare hex value from before the URL convention
                let needs_url = bundle
                    .get_str("webhook_secret")
                    .is_none_or(|value| !value.starts_with("http"));
                if needs_url {
                    match self.voipms_webhook_url() {
                        Ok(url) => bundle.insert("webhook_secret", url),
                        Err(_) => tracing::warn!(
                            target: TRACING_TARGET_STORE,
                            "Public base URL not configured; skipping VoIP.ms webhook URL provisioning"
                        ),
                    }
                }
            }
            IntegrationProvider::Whatsapp => {
                if bundle.get_str("provider") == Some("meta")
                    && bundle.get_str("meta_verify_token").is_none()
                {
                    bundle.insert("meta_verify_token", random_webhook_secret());
                }
            }
            IntegrationProvider::Sola => {
                if bundle.get_str("webhook_secret").is_none() {
                    bundle.insert("webhook_secret", random_webhook_secret());
                }
            }
            IntegrationProvider::Email | IntegrationProvider::Quickbooks => {}
        }
    }

    fn voipms_webhook_url(&self) -> Result<String> {
        let Some(base) = self.public_base_url.as_ref() else {
            return Err(Error::configuration()
                .with_message("public base URL is not configured for webhook provisioning"));
        };
        Ok(format!(
            "{}/api/webhooks/voipms",
            base.as_str().trim_end_matches('/')
        ))
    }
}

/// Generates a fresh 32-byte webhook secret, hex encoded.
fn random_webhook_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Merges a metadata patch into existing metadata; patch keys win.
pub(crate) fn merge_metadata(existing: Option<&Value>, patch: Option<Value>) -> Value {
    let mut merged = match existing {
        Some(Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };

    if let Some(Value::Object(patch)) = patch {
        for (key, value) in patch {
            merged.insert(key, value);
        }
    }

    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trellis_core::ErrorKind;
    use trellis_core::crypto::EncryptionKey;
    use trellis_postgres::types::ConnectionStatus;

    use super::*;
    use crate::mock::MemoryBackend;

    fn store() -> ConnectionStore<MemoryBackend> {
        ConnectionStore::new(
            MemoryBackend::default(),
            SecretCipher::new(EncryptionKey::generate()),
        )
        .with_public_base_url(Url::parse("https://app.example.com").unwrap())
    }

    fn email_bundle() -> SecretBundle {
        let mut bundle = SecretBundle::new();
        bundle.insert("provider", "resend");
        bundle.insert("api_key", "sk_x");
        bundle.insert("from_email", "a@b.com");
        bundle
    }

    fn voipms_bundle() -> SecretBundle {
        let mut bundle = SecretBundle::new();
        bundle.insert("username", "tenant_user");
        bundle.insert("api_password", "  api-pass  ");
        bundle.insert("default_did", "+1 (555) 123-4567");
        bundle
    }

    #[tokio::test]
    async fn test_save_then_get_secrets_roundtrip() {
        let store = store();
        let tenant = Uuid::new_v4();

        let connection = store
            .save(tenant, IntegrationProvider::Email, email_bundle(), None, None)
            .await
            .unwrap();
        assert!(connection.has_secrets());
        // Saving never touches health bookkeeping
        assert_eq!(connection.status, ConnectionStatus::NotConfigured);
        assert!(connection.last_error.is_none());

        let secrets = store
            .get_secrets(tenant, IntegrationProvider::Email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secrets.get_str("api_key"), Some("sk_x"));
    }

    #[tokio::test]
    async fn test_save_validates_required_fields() {
        let store = store();
        let tenant = Uuid::new_v4();

        let mut incomplete = email_bundle();
        incomplete.remove("api_key");

        let error = store
            .save(tenant, IntegrationProvider::Email, incomplete, None, None)
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.message.unwrap().contains("api_key"));

        // Nothing was persisted
        assert!(
            store
                .get(tenant, IntegrationProvider::Email)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_save_merges_masked_input_over_stored_value() {
        let store = store();
        let tenant = Uuid::new_v4();

        store
            .save(tenant, IntegrationProvider::Email, email_bundle(), None, None)
            .await
            .unwrap();

        let mut resubmitted = email_bundle();
        resubmitted.insert("api_key", "••••••sk_x");
        resubmitted.insert("reply_to", "ops@b.com");

        store
            .save(tenant, IntegrationProvider::Email, resubmitted, None, None)
            .await
            .unwrap();

        let secrets = store
            .get_secrets(tenant, IntegrationProvider::Email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secrets.get_str("api_key"), Some("sk_x"));
        assert_eq!(secrets.get_str("reply_to"), Some("ops@b.com"));
    }

    #[tokio::test]
    async fn test_save_normalizes_voipms_did_and_provisions_webhook_url() {
        let store = store();
        let tenant = Uuid::new_v4();

        store
            .save(
                tenant,
                IntegrationProvider::VoipmsSms,
                voipms_bundle(),
                None,
                None,
            )
            .await
            .unwrap();

        let secrets = store
            .get_secrets(tenant, IntegrationProvider::VoipmsSms)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secrets.get_str("default_did"), Some("5551234567"));
        assert_eq!(secrets.get_str("api_password"), Some("api-pass"));
        assert_eq!(
            secrets.get_str("webhook_secret"),
            Some("https://app.example.com/api/webhooks/voipms")
        );
    }

    #[tokio::test]
    async fn test_save_provisions_sola_webhook_secret() {
        let store = store();
        let tenant = Uuid::new_v4();

        let mut bundle = SecretBundle::new();
        bundle.insert("mode", "sandbox");
        bundle.insert("secret_key", "sk_sandbox_abcdef");

        store
            .save(tenant, IntegrationProvider::Sola, bundle, None, None)
            .await
            .unwrap();

        let secrets = store
            .get_secrets(tenant, IntegrationProvider::Sola)
            .await
            .unwrap()
            .unwrap();
        let webhook = secrets.get_str("webhook_secret").unwrap();
        assert_eq!(webhook.len(), 64);
        assert!(webhook.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_metadata_patch_merges_with_new_keys_winning() {
        let store = store();
        let tenant = Uuid::new_v4();

        store
            .save(
                tenant,
                IntegrationProvider::Email,
                email_bundle(),
                None,
                Some(json!({"realm": "first", "region": "us"})),
            )
            .await
            .unwrap();

        let connection = store
            .save(
                tenant,
                IntegrationProvider::Email,
                email_bundle(),
                None,
                Some(json!({"realm": "second"})),
            )
            .await
            .unwrap();

        assert_eq!(connection.metadata["realm"], "second");
        assert_eq!(connection.metadata["region"], "us");
    }

    #[tokio::test]
    async fn test_concurrent_style_saves_keep_one_row() {
        let store = store();
        let tenant = Uuid::new_v4();

        let mut second = email_bundle();
        second.insert("api_key", "sk_y");

        store
            .save(tenant, IntegrationProvider::Email, email_bundle(), None, None)
            .await
            .unwrap();
        store
            .save(tenant, IntegrationProvider::Email, second, None, None)
            .await
            .unwrap();

        let connections = store.list(tenant).await.unwrap();
        assert_eq!(connections.len(), 1);

        let secrets = store
            .get_secrets(tenant, IntegrationProvider::Email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secrets.get_str("api_key"), Some("sk_y"));
    }

    #[tokio::test]
    async fn test_corrupted_record_fails_closed_and_does_not_block_others() {
        let store = store();
        let tenant = Uuid::new_v4();

        store
            .save(tenant, IntegrationProvider::Email, email_bundle(), None, None)
            .await
            .unwrap();

        // Simulate a record encrypted under a lost key
        store
            .backend()
            .upsert(NewIntegrationConnection {
                tenant_id: tenant,
                provider: IntegrationProvider::Sola,
                display_name: None,
                encrypted_secrets: "bm90LWEtcmVhbC1lbnZlbG9wZQ==".to_string(),
                metadata: json!({}),
            })
            .await
            .unwrap();

        assert!(
            store
                .get_secrets(tenant, IntegrationProvider::Sola)
                .await
                .unwrap()
                .is_none()
        );

        // The corrupt record does not affect listing or other providers
        assert_eq!(store.list(tenant).await.unwrap().len(), 2);
        assert!(
            store
                .get_secrets(tenant, IntegrationProvider::Email)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_disconnect_clears_secrets_and_resets_status() {
        let store = store();
        let tenant = Uuid::new_v4();

        store
            .save(tenant, IntegrationProvider::Email, email_bundle(), None, None)
            .await
            .unwrap();

        let disconnected = store
            .disconnect(tenant, IntegrationProvider::Email)
            .await
            .unwrap()
            .unwrap();
        assert!(!disconnected.has_secrets());
        assert_eq!(disconnected.status, ConnectionStatus::NotConfigured);
        assert!(disconnected.last_error.is_none());

        assert!(
            store
                .get_secrets(tenant, IntegrationProvider::Email)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_regenerate_webhook_secret_returns_plaintext_once() {
        let store = store();
        let tenant = Uuid::new_v4();

        let mut bundle = SecretBundle::new();
        bundle.insert("mode", "sandbox");
        bundle.insert("secret_key", "sk_sandbox_abcdef");
        store
            .save(tenant, IntegrationProvider::Sola, bundle, None, None)
            .await
            .unwrap();

        let first = store
            .get_secrets(tenant, IntegrationProvider::Sola)
            .await
            .unwrap()
            .unwrap()
            .get_str("webhook_secret")
            .unwrap()
            .to_string();

        let rotated = store
            .regenerate_webhook_secret(tenant, IntegrationProvider::Sola)
            .await
            .unwrap();
        assert_ne!(rotated, first);

        let stored = store
            .get_secrets(tenant, IntegrationProvider::Sola)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_str("webhook_secret"), Some(rotated.as_str()));
    }

    #[tokio::test]
    async fn test_regenerate_rejects_unsupported_provider() {
        let store = store();
        let tenant = Uuid::new_v4();

        let error = store
            .regenerate_webhook_secret(tenant, IntegrationProvider::Email)
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);

        let error = store
            .regenerate_webhook_secret(tenant, IntegrationProvider::Sola)
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotConnected);
    }
}
