//! Connection status enumeration for integration health tracking.

use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Defines the health state of a tenant's integration connection.
///
/// This enumeration corresponds to the `CONNECTION_STATUS` PostgreSQL enum and
/// drives the connection state machine:
///
/// `NotConfigured → Connecting → {Connected, Error}`
///
/// `Connecting` is set optimistically when a save or test begins, before the
/// network probe completes. `Connected` and `Error` freely re-enter
/// `Connecting`/`Connected`/`Error` on later saves, tests, and sends; only an
/// explicit disconnect returns a connection to `NotConfigured`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::ConnectionStatus"]
pub enum ConnectionStatus {
    /// No credentials saved, or explicitly disconnected
    #[db_rename = "not_configured"]
    #[serde(rename = "not_configured")]
    #[strum(serialize = "not_configured")]
    #[default]
    NotConfigured,

    /// A save or test is in flight; the outcome is not yet known
    #[db_rename = "connecting"]
    #[serde(rename = "connecting")]
    #[strum(serialize = "connecting")]
    Connecting,

    /// The last test or send succeeded
    #[db_rename = "connected"]
    #[serde(rename = "connected")]
    #[strum(serialize = "connected")]
    Connected,

    /// The last test or send failed; `last_error` carries the reason
    #[db_rename = "error"]
    #[serde(rename = "error")]
    #[strum(serialize = "error")]
    Error,
}

impl ConnectionStatus {
    /// Returns whether the connection has stored, usable credentials.
    #[inline]
    pub fn is_configured(self) -> bool {
        !matches!(self, ConnectionStatus::NotConfigured)
    }

    /// Returns whether the connection is operational.
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Returns whether the connection requires operator attention.
    #[inline]
    pub fn has_failed(self) -> bool {
        matches!(self, ConnectionStatus::Error)
    }

    /// Returns whether `next` is a valid transition from this state.
    ///
    /// Every configured state may move to any other configured state (a new
    /// save/test/send can always re-probe), while `NotConfigured` is only
    /// reachable through disconnect and only leaves through `Connecting`.
    #[inline]
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        match self {
            ConnectionStatus::NotConfigured => matches!(next, ConnectionStatus::Connecting),
            ConnectionStatus::Connecting
            | ConnectionStatus::Connected
            | ConnectionStatus::Error => true,
        }
    }

    /// Returns a description of what the connection status means.
    #[inline]
    pub fn description(self) -> &'static str {
        match self {
            ConnectionStatus::NotConfigured => "Integration has no stored credentials",
            ConnectionStatus::Connecting => "Integration is being verified",
            ConnectionStatus::Connected => "Integration is connected and operational",
            ConnectionStatus::Error => "Integration failed its last check and requires attention",
        }
    }
}
