//! Integration provider enumeration identifying third-party services.

use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identifies a third-party service a tenant can connect.
///
/// This enumeration corresponds to the `INTEGRATION_PROVIDER` PostgreSQL enum.
/// Together with the tenant id it forms the unique key of an integration
/// connection: each tenant holds at most one connection per provider.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::IntegrationProvider"]
pub enum IntegrationProvider {
    /// Transactional email (SendGrid, Mailgun or Resend sub-providers)
    #[db_rename = "email"]
    #[serde(rename = "email")]
    #[strum(serialize = "email")]
    Email,

    /// VoIP.ms SMS and MMS carrier
    #[db_rename = "voipms_sms"]
    #[serde(rename = "voipms_sms")]
    #[strum(serialize = "voipms_sms")]
    VoipmsSms,

    /// WhatsApp messaging (Twilio or Meta Cloud sub-providers)
    #[db_rename = "whatsapp"]
    #[serde(rename = "whatsapp")]
    #[strum(serialize = "whatsapp")]
    Whatsapp,

    /// QuickBooks Online accounting
    #[db_rename = "quickbooks"]
    #[serde(rename = "quickbooks")]
    #[strum(serialize = "quickbooks")]
    Quickbooks,

    /// Sola payment processing
    #[db_rename = "sola"]
    #[serde(rename = "sola")]
    #[strum(serialize = "sola")]
    Sola,
}

impl IntegrationProvider {
    /// Returns the stable identifier used in API paths and stored rows.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationProvider::Email => "email",
            IntegrationProvider::VoipmsSms => "voipms_sms",
            IntegrationProvider::Whatsapp => "whatsapp",
            IntegrationProvider::Quickbooks => "quickbooks",
            IntegrationProvider::Sola => "sola",
        }
    }

    /// Returns whether this provider maintains a webhook secret the operator
    /// must copy into the provider's dashboard.
    #[inline]
    pub fn has_webhook_secret(self) -> bool {
        matches!(
            self,
            IntegrationProvider::VoipmsSms | IntegrationProvider::Whatsapp | IntegrationProvider::Sola
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_from_str_roundtrip() {
        for provider in [
            IntegrationProvider::Email,
            IntegrationProvider::VoipmsSms,
            IntegrationProvider::Whatsapp,
            IntegrationProvider::Quickbooks,
            IntegrationProvider::Sola,
        ] {
            let parsed = IntegrationProvider::from_str(provider.as_str()).unwrap();
            assert_eq!(parsed, provider);
        }
    }

    #[test]
    fn test_webhook_secret_providers() {
        assert!(IntegrationProvider::VoipmsSms.has_webhook_secret());
        assert!(IntegrationProvider::Sola.has_webhook_secret());
        assert!(IntegrationProvider::Whatsapp.has_webhook_secret());
        assert!(!IntegrationProvider::Email.has_webhook_secret());
        assert!(!IntegrationProvider::Quickbooks.has_webhook_secret());
    }
}
