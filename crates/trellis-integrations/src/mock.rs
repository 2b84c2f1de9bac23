//! In-memory connection backend for tests and local tooling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trellis_core::Result;
use trellis_postgres::model::{
    IntegrationConnection, NewIntegrationConnection, UpdateIntegrationConnection,
};
use trellis_postgres::types::{ConnectionStatus, IntegrationProvider};
use uuid::Uuid;

use crate::store::ConnectionBackend;

/// A [`ConnectionBackend`] holding connections in process memory.
///
/// Semantics mirror the Postgres backend: one row per `(tenant, provider)`
/// key, upserts replace secrets/display-name/metadata while leaving health
/// bookkeeping untouched, and updates return `None` for missing rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<HashMap<(Uuid, IntegrationProvider), IntegrationConnection>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the backend holds no connections.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(Uuid, IntegrationProvider), IntegrationConnection>>
    {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn now() -> jiff_diesel::Timestamp {
    jiff::Timestamp::now().into()
}

impl ConnectionBackend for MemoryBackend {
    async fn find(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<IntegrationConnection>> {
        Ok(self.lock().get(&(tenant, provider)).cloned())
    }

    async fn list(&self, tenant: Uuid) -> Result<Vec<IntegrationConnection>> {
        let mut connections: Vec<IntegrationConnection> = self
            .lock()
            .values()
            .filter(|connection| connection.tenant_id == tenant)
            .cloned()
            .collect();
        connections.sort_by_key(|connection| {
            std::cmp::Reverse(jiff::Timestamp::from(connection.created_at))
        });
        Ok(connections)
    }

    async fn upsert(
        &self,
        connection: NewIntegrationConnection,
    ) -> Result<IntegrationConnection> {
        let mut inner = self.lock();
        let key = (connection.tenant_id, connection.provider);

        let row = match inner.get(&key) {
            Some(existing) => IntegrationConnection {
                display_name: connection.display_name,
                encrypted_secrets: connection.encrypted_secrets,
                metadata: connection.metadata,
                updated_at: now(),
                ..existing.clone()
            },
            None => IntegrationConnection {
                id: Uuid::now_v7(),
                tenant_id: connection.tenant_id,
                provider: connection.provider,
                display_name: connection.display_name,
                encrypted_secrets: connection.encrypted_secrets,
                metadata: connection.metadata,
                status: ConnectionStatus::NotConfigured,
                last_error: None,
                last_checked_at: None,
                created_at: now(),
                updated_at: now(),
            },
        };

        inner.insert(key, row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
        changes: UpdateIntegrationConnection,
    ) -> Result<Option<IntegrationConnection>> {
        let mut inner = self.lock();
        let Some(row) = inner.get_mut(&(tenant, provider)) else {
            return Ok(None);
        };

        if let Some(display_name) = changes.display_name {
            row.display_name = Some(display_name);
        }
        if let Some(encrypted_secrets) = changes.encrypted_secrets {
            row.encrypted_secrets = encrypted_secrets;
        }
        if let Some(metadata) = changes.metadata {
            row.metadata = metadata;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(last_error) = changes.last_error {
            row.last_error = last_error;
        }
        if let Some(last_checked_at) = changes.last_checked_at {
            row.last_checked_at = last_checked_at;
        }
        row.updated_at = changes.updated_at.unwrap_or_else(now);

        Ok(Some(row.clone()))
    }

    async fn disconnect(
        &self,
        tenant: Uuid,
        provider: IntegrationProvider,
    ) -> Result<Option<IntegrationConnection>> {
        self.update(
            tenant,
            provider,
            UpdateIntegrationConnection {
                encrypted_secrets: Some(String::new()),
                status: Some(ConnectionStatus::NotConfigured),
                last_error: Some(None),
                updated_at: Some(now()),
                ..Default::default()
            },
        )
        .await
    }
}
