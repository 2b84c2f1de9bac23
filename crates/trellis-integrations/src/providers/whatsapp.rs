//! WhatsApp adapter.
//!
//! One logical WhatsApp integration dispatches to one of two sub-providers
//! selected by the `provider` secret field. The two are not interchangeable:
//! Twilio authenticates with Basic auth over form-encoded requests and
//! expects `whatsapp:+<digits>` destinations, while the Meta Cloud API uses
//! Bearer tokens, JSON payloads, and bare-digit destinations. Each path
//! normalizes its destination independently.

use serde_json::{Value, json};
use trellis_core::{Error, Result};
use url::Url;

use super::{DeliveryReceipt, TestReport, transport_error};
use crate::http::HttpConfig;
use crate::secrets::SecretBundle;

/// Production Twilio API endpoint.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Production Meta Cloud API endpoint (versioned).
pub const META_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// Sub-provider handling a tenant's WhatsApp traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatsAppVendor {
    /// Twilio WhatsApp.
    Twilio,
    /// Meta WhatsApp Cloud API.
    Meta,
}

/// Typed credentials for the Twilio sub-provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioWhatsAppSecrets {
    /// Twilio account SID.
    pub account_sid: String,
    /// Twilio auth token.
    pub auth_token: String,
    /// WhatsApp-enabled from number (`whatsapp:+...`).
    pub from_number: Option<String>,
    /// Messaging service SID used as the from-line when no number is set.
    pub messaging_service_sid: Option<String>,
}

impl TwilioWhatsAppSecrets {
    /// Returns the from-line for outbound messages: the configured number,
    /// or the messaging service SID as a fallback.
    pub fn from_line(&self) -> Option<&str> {
        self.from_number
            .as_deref()
            .or(self.messaging_service_sid.as_deref())
    }
}

/// Typed credentials for the Meta Cloud sub-provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaWhatsAppSecrets {
    /// Business phone number id.
    pub phone_number_id: String,
    /// Permanent access token.
    pub access_token: String,
    /// App secret for webhook signatures (consumed elsewhere).
    pub app_secret: Option<String>,
    /// Webhook verify token.
    pub verify_token: Option<String>,
}

/// Typed credentials for the WhatsApp integration, discriminated by
/// sub-provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhatsAppSecrets {
    /// Twilio WhatsApp credentials.
    Twilio(TwilioWhatsAppSecrets),
    /// Meta Cloud API credentials.
    Meta(MetaWhatsAppSecrets),
}

impl WhatsAppSecrets {
    /// Returns the sub-provider these credentials target.
    pub fn vendor(&self) -> WhatsAppVendor {
        match self {
            WhatsAppSecrets::Twilio(_) => WhatsAppVendor::Twilio,
            WhatsAppSecrets::Meta(_) => WhatsAppVendor::Meta,
        }
    }
}

impl TryFrom<&SecretBundle> for WhatsAppSecrets {
    type Error = Error;

    fn try_from(bundle: &SecretBundle) -> Result<Self> {
        match bundle.get_str("provider").unwrap_or("twilio") {
            "twilio" => {
                let (Some(account_sid), Some(auth_token)) = (
                    bundle.get_str("twilio_account_sid"),
                    bundle.get_str("twilio_auth_token"),
                ) else {
                    return Err(Error::configuration().with_message(
                        "Twilio WhatsApp credentials not configured: \
                         missing twilio_account_sid or twilio_auth_token",
                    ));
                };

                let secrets = TwilioWhatsAppSecrets {
                    account_sid: account_sid.to_string(),
                    auth_token: auth_token.to_string(),
                    from_number: bundle.get_str("twilio_from_number").map(str::to_string),
                    messaging_service_sid: bundle
                        .get_str("twilio_messaging_service_sid")
                        .map(str::to_string),
                };

                if secrets.from_line().is_none() {
                    return Err(Error::configuration().with_message(
                        "Twilio WhatsApp credentials not configured: \
                         missing twilio_from_number",
                    ));
                }

                Ok(WhatsAppSecrets::Twilio(secrets))
            }
            "meta" => {
                let (Some(phone_number_id), Some(access_token)) = (
                    bundle.get_str("meta_phone_number_id"),
                    bundle.get_str("meta_access_token"),
                ) else {
                    return Err(Error::configuration().with_message(
                        "Meta WhatsApp credentials not configured: \
                         missing meta_phone_number_id or meta_access_token",
                    ));
                };

                Ok(WhatsAppSecrets::Meta(MetaWhatsAppSecrets {
                    phone_number_id: phone_number_id.to_string(),
                    access_token: access_token.to_string(),
                    app_secret: bundle.get_str("meta_app_secret").map(str::to_string),
                    verify_token: bundle.get_str("meta_verify_token").map(str::to_string),
                }))
            }
            other => Err(Error::configuration()
                .with_message(format!("Unsupported WhatsApp provider: {other}"))),
        }
    }
}

/// Formats a destination for Twilio: `whatsapp:+<digits>`.
fn twilio_destination(to: &str) -> String {
    if to.starts_with("whatsapp:") {
        to.to_string()
    } else {
        let digits: String = to.chars().filter(char::is_ascii_digit).collect();
        format!("whatsapp:+{digits}")
    }
}

/// Formats a destination for the Meta Cloud API: bare digits.
fn meta_destination(to: &str) -> String {
    to.chars().filter(char::is_ascii_digit).collect()
}

/// HTTP client for both WhatsApp sub-providers.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    twilio_api_base: String,
    meta_api_base: String,
}

impl WhatsAppClient {
    /// Creates a new client against the production endpoints.
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: config.build_client(),
            twilio_api_base: TWILIO_API_BASE.to_string(),
            meta_api_base: META_API_BASE.to_string(),
        }
    }

    /// Overrides the Twilio endpoint (used by tests).
    #[must_use]
    pub fn with_twilio_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.twilio_api_base = api_base.into();
        self
    }

    /// Overrides the Meta endpoint (used by tests).
    #[must_use]
    pub fn with_meta_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.meta_api_base = api_base.into();
        self
    }

    /// Sends a probe message to verify the stored credentials end to end.
    pub async fn test(
        &self,
        secrets: &WhatsAppSecrets,
        to: &str,
        message: &str,
    ) -> Result<TestReport> {
        let receipt = self.send(secrets, to, message, None).await?;

        let via = match secrets.vendor() {
            WhatsAppVendor::Twilio => "Twilio",
            WhatsAppVendor::Meta => "Meta",
        };

        if receipt.success {
            Ok(TestReport::ok(format!(
                "Test WhatsApp message sent successfully to {to} via {via}"
            )))
        } else {
            Ok(TestReport::failed(
                format!("{via} WhatsApp test failed"),
                receipt.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Sends a WhatsApp message, optionally with one media attachment.
    pub async fn send(
        &self,
        secrets: &WhatsAppSecrets,
        to: &str,
        message: &str,
        media_url: Option<&Url>,
    ) -> Result<DeliveryReceipt> {
        match secrets {
            WhatsAppSecrets::Twilio(secrets) => {
                Ok(self.send_twilio(secrets, to, message, media_url).await)
            }
            WhatsAppSecrets::Meta(secrets) => {
                Ok(self.send_meta(secrets, to, message, media_url).await)
            }
        }
    }

    async fn send_twilio(
        &self,
        secrets: &TwilioWhatsAppSecrets,
        to: &str,
        message: &str,
        media_url: Option<&Url>,
    ) -> DeliveryReceipt {
        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.twilio_api_base.trim_end_matches('/'),
            secrets.account_sid
        );

        // from_line is validated during bundle conversion
        let from = secrets.from_line().unwrap_or_default();

        let mut form = vec![
            ("From".to_string(), from.to_string()),
            ("To".to_string(), twilio_destination(to)),
            ("Body".to_string(), message.to_string()),
        ];
        if let Some(url) = media_url {
            form.push(("MediaUrl".to_string(), url.to_string()));
        }

        let response = match self
            .http
            .post(&endpoint)
            .basic_auth(&secrets.account_sid, Some(&secrets.auth_token))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return DeliveryReceipt::failed(transport_error("Twilio WhatsApp", &error));
            }
        };

        let http_status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                return DeliveryReceipt::failed(transport_error("Twilio WhatsApp", &error));
            }
        };

        let sid = body.get("sid").and_then(Value::as_str);
        if http_status.is_success()
            && let Some(sid) = sid
        {
            return DeliveryReceipt::delivered(Some(sid.to_string()));
        }

        let error = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Twilio API error: {}", http_status.as_u16()));
        DeliveryReceipt::failed(error)
    }

    async fn send_meta(
        &self,
        secrets: &MetaWhatsAppSecrets,
        to: &str,
        message: &str,
        media_url: Option<&Url>,
    ) -> DeliveryReceipt {
        let endpoint = format!(
            "{}/{}/messages",
            self.meta_api_base.trim_end_matches('/'),
            secrets.phone_number_id
        );

        let mut payload = json!({
            "messaging_product": "whatsapp",
            "to": meta_destination(to),
        });
        match media_url {
            Some(url) => {
                payload["type"] = json!("image");
                payload["image"] = json!({ "link": url.to_string() });
            }
            None => {
                payload["type"] = json!("text");
                payload["text"] = json!({ "body": message });
            }
        }

        let response = match self
            .http
            .post(&endpoint)
            .bearer_auth(&secrets.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return DeliveryReceipt::failed(transport_error("Meta WhatsApp", &error));
            }
        };

        let http_status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                return DeliveryReceipt::failed(transport_error("Meta WhatsApp", &error));
            }
        };

        if http_status.is_success() && body.get("messages").is_some() {
            let message_id = body
                .pointer("/messages/0/id")
                .and_then(Value::as_str)
                .map(str::to_string);
            return DeliveryReceipt::delivered(message_id);
        }

        let error = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Meta API error: {}", http_status.as_u16()));
        DeliveryReceipt::failed(error)
    }
}
