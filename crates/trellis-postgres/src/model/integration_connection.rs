//! Integration connection model for PostgreSQL database operations.

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use uuid::Uuid;

use crate::schema::integration_connections;
use crate::types::{ConnectionStatus, IntegrationProvider};

/// Integration connection model representing one tenant's encrypted
/// credentials and health state for a single provider.
///
/// Secrets are stored as an opaque encrypted envelope (`encrypted_secrets`);
/// an empty string means "no secrets stored". Non-secret provider context
/// (an external account id, a realm id) lives unencrypted in `metadata` so it
/// can be merge-updated without a decrypt/re-encrypt cycle.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = integration_connections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IntegrationConnection {
    /// Unique connection identifier.
    pub id: Uuid,
    /// Tenant that owns this connection.
    pub tenant_id: Uuid,
    /// Third-party provider this connection targets.
    pub provider: IntegrationProvider,
    /// Optional human-readable label.
    pub display_name: Option<String>,
    /// Encrypted secrets envelope; empty when no secrets are stored.
    pub encrypted_secrets: String,
    /// Non-secret provider context, merge-updated incrementally.
    pub metadata: serde_json::Value,
    /// Current connection health state.
    pub status: ConnectionStatus,
    /// Last human-readable failure message; cleared on success.
    pub last_error: Option<String>,
    /// Timestamp of the most recent save/test/send outcome.
    pub last_checked_at: Option<Timestamp>,
    /// Timestamp when the connection was created.
    pub created_at: Timestamp,
    /// Timestamp when the connection was last updated.
    pub updated_at: Timestamp,
}

/// Data for creating (or upserting) an integration connection.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = integration_connections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewIntegrationConnection {
    /// Tenant ID (required).
    pub tenant_id: Uuid,
    /// Provider (required).
    pub provider: IntegrationProvider,
    /// Display name.
    pub display_name: Option<String>,
    /// Encrypted secrets envelope.
    pub encrypted_secrets: String,
    /// Non-secret provider context.
    pub metadata: serde_json::Value,
}

/// Data for updating an integration connection.
///
/// Double-`Option` fields distinguish "leave unchanged" (`None`) from
/// "set to NULL" (`Some(None)`).
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = integration_connections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UpdateIntegrationConnection {
    /// Display name.
    pub display_name: Option<String>,
    /// Encrypted secrets envelope.
    pub encrypted_secrets: Option<String>,
    /// Non-secret provider context (whole-value replacement; callers merge).
    pub metadata: Option<serde_json::Value>,
    /// Connection health state.
    pub status: Option<ConnectionStatus>,
    /// Last failure message.
    pub last_error: Option<Option<String>>,
    /// Timestamp of the most recent save/test/send outcome.
    pub last_checked_at: Option<Option<Timestamp>>,
    /// Timestamp when the connection was last updated.
    pub updated_at: Option<Timestamp>,
}

impl IntegrationConnection {
    /// Returns whether the record holds an encrypted secrets envelope.
    pub fn has_secrets(&self) -> bool {
        !self.encrypted_secrets.is_empty()
    }

    /// Returns whether the connection failed its last check.
    pub fn has_error(&self) -> bool {
        self.status.has_failed()
    }

    /// Returns whether the connection is connected and operational.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}
