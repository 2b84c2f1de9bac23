//! Logical message channels.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use trellis_postgres::types::IntegrationProvider;

/// A logical message medium.
///
/// Each channel maps to exactly one configured provider per tenant at a
/// time; the router performs the mapping, so callers never name providers
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    /// Text (and picture) messages over the tenant's SMS carrier.
    Sms,
    /// WhatsApp messages.
    Whatsapp,
    /// Transactional email.
    Email,
}

impl Channel {
    /// Returns the provider that serves this channel.
    pub fn provider(self) -> IntegrationProvider {
        match self {
            Channel::Sms => IntegrationProvider::VoipmsSms,
            Channel::Whatsapp => IntegrationProvider::Whatsapp,
            Channel::Email => IntegrationProvider::Email,
        }
    }

    /// Returns the failure message for a channel with no stored
    /// configuration.
    pub fn not_configured_error(self) -> &'static str {
        match self {
            Channel::Sms => "VoIP.ms SMS not configured",
            Channel::Whatsapp => "WhatsApp not configured",
            Channel::Email => "Email provider not configured",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_channel_provider_mapping() {
        assert_eq!(Channel::Sms.provider(), IntegrationProvider::VoipmsSms);
        assert_eq!(Channel::Whatsapp.provider(), IntegrationProvider::Whatsapp);
        assert_eq!(Channel::Email.provider(), IntegrationProvider::Email);
    }

    #[test]
    fn test_channel_parsing() {
        assert_eq!(Channel::from_str("sms").unwrap(), Channel::Sms);
        assert_eq!(Channel::from_str("whatsapp").unwrap(), Channel::Whatsapp);
        assert_eq!(Channel::from_str("email").unwrap(), Channel::Email);
        assert!(Channel::from_str("fax").is_err());
    }

    #[test]
    fn test_not_configured_errors_mention_not_configured() {
        for channel in [Channel::Sms, Channel::Whatsapp, Channel::Email] {
            assert!(channel.not_configured_error().contains("not configured"));
        }
    }
}
