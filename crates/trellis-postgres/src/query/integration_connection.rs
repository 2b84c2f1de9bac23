//! Integration connection repository for per-tenant provider connections.

use std::future::Future;

use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use jiff_diesel::Timestamp;
use uuid::Uuid;

use crate::model::{IntegrationConnection, NewIntegrationConnection, UpdateIntegrationConnection};
use crate::types::{ConnectionStatus, IntegrationProvider};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for integration connection database operations.
///
/// A connection is uniquely keyed by `(tenant_id, provider)`; the upsert path
/// relies on that constraint so concurrent saves for the same pair never
/// create duplicate rows (last write wins).
pub trait IntegrationConnectionRepository {
    /// Finds the connection for a tenant and provider.
    fn find_connection(
        &mut self,
        tenant: Uuid,
        target: IntegrationProvider,
    ) -> impl Future<Output = PgResult<Option<IntegrationConnection>>> + Send;

    /// Lists all connections for a tenant, newest first.
    fn list_connections(
        &mut self,
        tenant: Uuid,
    ) -> impl Future<Output = PgResult<Vec<IntegrationConnection>>> + Send;

    /// Atomically inserts or updates the connection for `(tenant, provider)`.
    ///
    /// On conflict the secrets envelope, display name and metadata are
    /// replaced; status and error bookkeeping are left untouched, since
    /// status transitions flow through [`update_connection`].
    fn upsert_connection(
        &mut self,
        connection: NewIntegrationConnection,
    ) -> impl Future<Output = PgResult<IntegrationConnection>> + Send;

    /// Applies a changeset to the connection for `(tenant, provider)`.
    ///
    /// Returns `None` if no such connection exists.
    fn update_connection(
        &mut self,
        tenant: Uuid,
        target: IntegrationProvider,
        changes: UpdateIntegrationConnection,
    ) -> impl Future<Output = PgResult<Option<IntegrationConnection>>> + Send;

    /// Clears stored secrets and resets the connection to `NotConfigured`.
    ///
    /// Returns `None` if no such connection exists.
    fn disconnect_connection(
        &mut self,
        tenant: Uuid,
        target: IntegrationProvider,
        now: Timestamp,
    ) -> impl Future<Output = PgResult<Option<IntegrationConnection>>> + Send;
}

impl IntegrationConnectionRepository for PgConnection {
    async fn find_connection(
        &mut self,
        tenant: Uuid,
        target: IntegrationProvider,
    ) -> PgResult<Option<IntegrationConnection>> {
        use schema::integration_connections::dsl::*;

        let connection = integration_connections
            .filter(tenant_id.eq(tenant))
            .filter(provider.eq(target))
            .select(IntegrationConnection::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(connection)
    }

    async fn list_connections(&mut self, tenant: Uuid) -> PgResult<Vec<IntegrationConnection>> {
        use schema::integration_connections::dsl::*;

        let connections = integration_connections
            .filter(tenant_id.eq(tenant))
            .select(IntegrationConnection::as_select())
            .order(created_at.desc())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(connections)
    }

    async fn upsert_connection(
        &mut self,
        connection: NewIntegrationConnection,
    ) -> PgResult<IntegrationConnection> {
        use schema::integration_connections::dsl::*;

        let connection = diesel::insert_into(integration_connections)
            .values(&connection)
            .on_conflict((tenant_id, provider))
            .do_update()
            .set((
                display_name.eq(excluded(display_name)),
                encrypted_secrets.eq(excluded(encrypted_secrets)),
                metadata.eq(excluded(metadata)),
                updated_at.eq(diesel::dsl::now),
            ))
            .returning(IntegrationConnection::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(connection)
    }

    async fn update_connection(
        &mut self,
        tenant: Uuid,
        target: IntegrationProvider,
        changes: UpdateIntegrationConnection,
    ) -> PgResult<Option<IntegrationConnection>> {
        use schema::integration_connections::dsl::*;

        let connection = diesel::update(integration_connections)
            .filter(tenant_id.eq(tenant))
            .filter(provider.eq(target))
            .set(&changes)
            .returning(IntegrationConnection::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(connection)
    }

    async fn disconnect_connection(
        &mut self,
        tenant: Uuid,
        target: IntegrationProvider,
        now: Timestamp,
    ) -> PgResult<Option<IntegrationConnection>> {
        let changes = UpdateIntegrationConnection {
            encrypted_secrets: Some(String::new()),
            status: Some(ConnectionStatus::NotConfigured),
            last_error: Some(None),
            updated_at: Some(now),
            ..Default::default()
        };

        self.update_connection(tenant, target, changes).await
    }
}
