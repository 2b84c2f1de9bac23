//! Provider adapters for third-party services.
//!
//! Each adapter implements `test` (and, where applicable, `send`) over that
//! provider's actual wire protocol, converting the generic secret bundle into
//! a strongly-typed per-provider struct first. Adapters are intentionally not
//! unified behind one trait: their request shapes differ too much (SMS needs
//! a destination and sender line, email needs subject/HTML/reply-to,
//! accounting needs a token exchange before any call). The channel router
//! holds one case per logical channel and knows which adapter it may call.
//!
//! Failure semantics are uniform:
//!
//! - Missing or malformed credentials are configuration errors (`Err`) and
//!   never reach the network.
//! - Every *expected* provider-side condition (bad credentials, invalid
//!   destination, 4xx/5xx) comes back as an unsuccessful outcome, and
//!   transport-level failures (timeouts, connection errors, unparseable
//!   responses) are wrapped into the same shape, so callers have exactly one
//!   error-handling path.

pub mod email;
pub mod quickbooks;
pub mod sola;
pub mod voipms;
pub mod whatsapp;

pub use email::{EmailClient, EmailMessage, EmailSecrets, EmailVendor, MailgunRegion};
pub use quickbooks::{QuickBooksClient, QuickBooksConfig, QuickBooksEnvironment, QuickBooksSecrets};
pub use sola::{SolaClient, SolaMode, SolaSecrets};
pub use voipms::{VoipMsClient, VoipMsSecrets, normalize_nanp_digits};
pub use whatsapp::{
    MetaWhatsAppSecrets, TwilioWhatsAppSecrets, WhatsAppClient, WhatsAppSecrets, WhatsAppVendor,
};

/// Outcome of an explicit connection test.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TestReport {
    /// Whether the probe succeeded.
    pub success: bool,
    /// Human-readable summary of the outcome.
    pub message: String,
    /// Failure detail, when unsuccessful.
    pub error: Option<String>,
}

impl TestReport {
    /// Creates a successful report.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    /// Creates a failed report.
    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

/// Outcome of a single outbound delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeliveryReceipt {
    /// Whether the provider accepted the message.
    pub success: bool,
    /// Provider-assigned message identifier, when available.
    pub message_id: Option<String>,
    /// Failure detail, when unsuccessful.
    pub error: Option<String>,
}

impl DeliveryReceipt {
    /// Creates a successful receipt.
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    /// Creates a failed receipt.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Formats a transport-level failure the same way expected provider failures
/// are reported.
pub(crate) fn transport_error(context: &str, error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("{context} timed out")
    } else if error.is_connect() {
        format!("{context} connection failed")
    } else {
        format!("{context} request failed: {error}")
    }
}
