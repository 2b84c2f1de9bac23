//! Connection health manager.
//!
//! Tracks the per-connection state machine
//! `NotConfigured → Connecting → {Connected, Error}` and surfaces the
//! masked administration view. [`HealthManager::update`] is the single write
//! path for status: every save, every explicit test, and (where business
//! logic reflects delivery health in real time) every send reports its
//! outcome here, so downstream code and UI can trust the stored status
//! without re-probing the provider.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use trellis_core::{Error, Result};
use trellis_postgres::model::{IntegrationConnection, NewIntegrationConnection, UpdateIntegrationConnection};
use trellis_postgres::types::{ConnectionStatus, IntegrationProvider};
use uuid::Uuid;

use crate::TRACING_TARGET_HEALTH;
use crate::registry;
use crate::secrets::{SecretCipher, masked_bundle, webhook_secret_value};
use crate::store::{ConnectionBackend, merge_metadata};

/// Administration view of one connection.
///
/// Secrets appear only masked; the single exemption is the provider's
/// copy-only webhook secret, surfaced separately so the operator can paste it
/// into the third-party dashboard verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    /// Provider the view describes.
    pub provider: IntegrationProvider,
    /// Current health state.
    pub status: ConnectionStatus,
    /// Optional human-readable label.
    pub display_name: Option<String>,
    /// Stored configuration with password fields masked.
    pub masked_secrets: BTreeMap<String, String>,
    /// Non-secret provider context.
    pub metadata: Value,
    /// Last failure message, if the connection is erroring.
    pub last_error: Option<String>,
    /// Timestamp of the most recent save/test/send outcome.
    pub last_checked_at: Option<jiff::Timestamp>,
    /// Copy-only webhook secret, unmasked, for providers that have one.
    pub webhook_secret: Option<String>,
}

impl ConnectionView {
    /// The view of a provider no connection exists for.
    fn not_configured(provider: IntegrationProvider) -> Self {
        Self {
            provider,
            status: ConnectionStatus::NotConfigured,
            display_name: None,
            masked_secrets: BTreeMap::new(),
            metadata: Value::Object(serde_json::Map::new()),
            last_error: None,
            last_checked_at: None,
            webhook_secret: None,
        }
    }
}

/// Updates and reads the connection status state machine.
#[derive(Debug, Clone)]
pub struct HealthManager<B> {
    backend: B,
    cipher: SecretCipher,
}

impl<B: ConnectionBackend> HealthManager<B> {
    /// Creates a manager over a backend and cipher.
    ///
    /// The cipher is only used to decrypt stored bundles for the masked
    /// administration view; the manager never writes secrets.
    pub fn new(backend: B, cipher: SecretCipher) -> Self {
        Self { backend, cipher }
    }

    /// Records the outcome of a save, test, or send.
    ///
    /// Sets the status, replaces `last_error` (clearing it when no error is
    /// given), stamps `last_checked_at`, and merges the metadata patch with
    /// new keys winning. If no row exists yet (a provider reported status
    /// before any configuration was saved), one is created so the outcome is
    /// not lost.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_HEALTH,
        fields(%tenant, provider = %provider, status = %status)
    )]
    pub async fn update(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
        status: ConnectionStatus,
        error: Option<String>,
        metadata_patch: Option<Value>,
    ) -> Result<IntegrationConnection> {
        let existing = self.backend.find(tenant, provider).await?;

        if let Some(previous) = existing.as_ref()
            && !previous.status.can_transition_to(status)
        {
            tracing::warn!(
                target: TRACING_TARGET_HEALTH,
                from = %previous.status,
                to = %status,
                "Unusual connection status transition"
            );
        }

        let metadata = metadata_patch.map(|patch| {
            merge_metadata(
                existing.as_ref().map(|connection| &connection.metadata),
                Some(patch),
            )
        });

        let now: jiff_diesel::Timestamp = jiff::Timestamp::now().into();
        let changes = UpdateIntegrationConnection {
            status: Some(status),
            last_error: Some(error.clone()),
            last_checked_at: Some(Some(now)),
            metadata,
            updated_at: Some(now),
            ..Default::default()
        };

        if existing.is_none() {
            // Status arrived before any save; create the row so the outcome
            // is recorded
            self.backend
                .upsert(NewIntegrationConnection {
                    tenant_id: tenant,
                    provider,
                    display_name: None,
                    encrypted_secrets: String::new(),
                    metadata: Value::Object(serde_json::Map::new()),
                })
                .await?;
        }

        let updated = self.backend.update(tenant, provider, changes).await?;
        let connection = updated.ok_or_else(|| {
            Error::internal().with_message("connection row missing during status update")
        })?;

        if let Some(error) = error.as_deref() {
            tracing::warn!(
                target: TRACING_TARGET_HEALTH,
                provider = %provider,
                error,
                "Connection status updated with failure"
            );
        } else {
            tracing::debug!(
                target: TRACING_TARGET_HEALTH,
                provider = %provider,
                "Connection status updated"
            );
        }

        Ok(connection)
    }

    /// Returns the stored status, `NotConfigured` when no row exists.
    pub async fn status(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<ConnectionStatus> {
        Ok(self
            .backend
            .find(tenant, provider)
            .await?
            .map(|connection| connection.status)
            .unwrap_or_default())
    }

    /// Builds the masked administration view of a connection.
    ///
    /// Decryption failures leave the secrets section empty rather than
    /// failing the whole view; status, error, and timestamps still render so
    /// the operator can see there is something to fix.
    pub async fn connection_view(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<ConnectionView> {
        let Some(connection) = self.backend.find(tenant, provider).await? else {
            return Ok(ConnectionView::not_configured(provider));
        };

        let definition = registry::describe(provider);

        let (masked_secrets, webhook_secret) = if connection.has_secrets() {
            match self.cipher.decrypt(&connection.encrypted_secrets) {
                Ok(bundle) => {
                    let webhook_secret = provider
                        .has_webhook_secret()
                        .then(|| webhook_secret_value(definition, &bundle))
                        .flatten();
                    (masked_bundle(definition, &bundle), webhook_secret)
                }
                Err(error) => {
                    tracing::error!(
                        target: TRACING_TARGET_HEALTH,
                        provider = %provider,
                        error = %error,
                        "Failed to decrypt secrets for the administration view"
                    );
                    (BTreeMap::new(), None)
                }
            }
        } else {
            (BTreeMap::new(), None)
        };

        Ok(ConnectionView {
            provider: connection.provider,
            status: connection.status,
            display_name: connection.display_name,
            masked_secrets,
            metadata: connection.metadata,
            last_error: connection.last_error,
            last_checked_at: connection.last_checked_at.map(jiff::Timestamp::from),
            webhook_secret,
        })
    }
}
