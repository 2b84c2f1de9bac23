//! Process-wide messaging defaults.

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Fallback values used when a tenant has not overridden them.
///
/// These are the only provider inputs that do not come from the tenant's
/// decrypted secret bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct MessagingDefaults {
    /// Default email sender address
    #[cfg_attr(feature = "config", arg(long = "email-from", env = "EMAIL_FROM"))]
    #[serde(default)]
    pub default_from_email: Option<String>,

    /// Default email subject line
    #[cfg_attr(
        feature = "config",
        arg(
            long = "email-default-subject",
            env = "EMAIL_DEFAULT_SUBJECT",
            default_value = "Message from Trellis"
        )
    )]
    #[serde(default = "default_subject")]
    pub default_subject: String,
}

fn default_subject() -> String {
    "Message from Trellis".to_string()
}

impl Default for MessagingDefaults {
    fn default() -> Self {
        Self {
            default_from_email: None,
            default_subject: default_subject(),
        }
    }
}

impl MessagingDefaults {
    /// Sets the default sender address.
    #[must_use]
    pub fn with_default_from_email(mut self, from: impl Into<String>) -> Self {
        self.default_from_email = Some(from.into());
        self
    }
}
