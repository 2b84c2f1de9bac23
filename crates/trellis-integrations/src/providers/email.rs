//! Transactional email adapter.
//!
//! One logical email integration dispatches to SendGrid, Mailgun, or Resend,
//! selected by the `provider` secret field. All three accept an HTML body, a
//! plaintext fallback, and an optional reply-to address, but their error
//! contracts differ and are parsed per sub-provider: SendGrid reports errors
//! as a plain-text body and returns the message id in a response header,
//! Mailgun reports plain text over a region-dependent base URL, and Resend
//! uses JSON for both.

use serde_json::{Value, json};
use trellis_core::{Error, Result};

use super::{DeliveryReceipt, TestReport, transport_error};
use crate::http::HttpConfig;
use crate::secrets::SecretBundle;

/// Production SendGrid API endpoint.
pub const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

/// Production Mailgun API endpoint (US region).
pub const MAILGUN_US_API_BASE: &str = "https://api.mailgun.net";

/// Production Mailgun API endpoint (EU region).
pub const MAILGUN_EU_API_BASE: &str = "https://api.eu.mailgun.net";

/// Production Resend API endpoint.
pub const RESEND_API_BASE: &str = "https://api.resend.com";

/// Sub-provider handling a tenant's email traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailVendor {
    /// SendGrid v3 mail send.
    Sendgrid,
    /// Mailgun messages API.
    Mailgun,
    /// Resend emails API.
    Resend,
}

/// Mailgun serving region, selecting the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailgunRegion {
    /// United States (default).
    #[default]
    Us,
    /// European Union.
    Eu,
}

/// Typed credentials for the email integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSecrets {
    /// Sub-provider the API key belongs to.
    pub vendor: EmailVendor,
    /// Sub-provider API key.
    pub api_key: String,
    /// Sender address; falls back to the process-wide default when unset.
    pub from_email: Option<String>,
    /// Reply-To address.
    pub reply_to: Option<String>,
    /// Mailgun sending domain (Mailgun only).
    pub mailgun_domain: Option<String>,
    /// Mailgun region (Mailgun only).
    pub mailgun_region: MailgunRegion,
}

impl TryFrom<&SecretBundle> for EmailSecrets {
    type Error = Error;

    fn try_from(bundle: &SecretBundle) -> Result<Self> {
        let vendor = match bundle.get_str("provider").unwrap_or("resend") {
            "sendgrid" => EmailVendor::Sendgrid,
            "mailgun" => EmailVendor::Mailgun,
            "resend" => EmailVendor::Resend,
            other => {
                return Err(Error::configuration()
                    .with_message(format!("Unsupported email provider: {other}")));
            }
        };

        let Some(api_key) = bundle.get_str("api_key") else {
            return Err(Error::configuration()
                .with_message("Email credentials not configured: missing api_key"));
        };

        let mailgun_domain = bundle.get_str("mailgun_domain").map(str::to_string);
        if vendor == EmailVendor::Mailgun && mailgun_domain.is_none() {
            return Err(Error::configuration()
                .with_message("Mailgun configuration is missing mailgun_domain"));
        }

        let mailgun_region = match bundle.get_str("mailgun_region") {
            Some("eu") => MailgunRegion::Eu,
            _ => MailgunRegion::Us,
        };

        Ok(Self {
            vendor,
            api_key: api_key.to_string(),
            from_email: bundle.get_str("from_email").map(str::to_string),
            reply_to: bundle.get_str("reply_to").map(str::to_string),
            mailgun_domain,
            mailgun_region,
        })
    }
}

/// One outbound email.
#[derive(Debug, Clone)]
pub struct EmailMessage<'a> {
    /// Recipient address.
    pub to: &'a str,
    /// Subject line.
    pub subject: &'a str,
    /// HTML body.
    pub html: &'a str,
    /// Plaintext fallback body.
    pub text: Option<&'a str>,
    /// Resolved sender address.
    pub from: &'a str,
    /// Reply-To address.
    pub reply_to: Option<&'a str>,
}

/// HTTP client for the email sub-providers.
#[derive(Debug, Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    sendgrid_api_base: String,
    mailgun_us_api_base: String,
    mailgun_eu_api_base: String,
    resend_api_base: String,
}

impl EmailClient {
    /// Creates a new client against the production endpoints.
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: config.build_client(),
            sendgrid_api_base: SENDGRID_API_BASE.to_string(),
            mailgun_us_api_base: MAILGUN_US_API_BASE.to_string(),
            mailgun_eu_api_base: MAILGUN_EU_API_BASE.to_string(),
            resend_api_base: RESEND_API_BASE.to_string(),
        }
    }

    /// Overrides the SendGrid endpoint (used by tests).
    #[must_use]
    pub fn with_sendgrid_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.sendgrid_api_base = api_base.into();
        self
    }

    /// Overrides both Mailgun endpoints (used by tests).
    #[must_use]
    pub fn with_mailgun_api_base(mut self, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into();
        self.mailgun_us_api_base = api_base.clone();
        self.mailgun_eu_api_base = api_base;
        self
    }

    /// Overrides the Resend endpoint (used by tests).
    #[must_use]
    pub fn with_resend_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.resend_api_base = api_base.into();
        self
    }

    /// Sends a probe email to verify the stored credentials end to end.
    pub async fn test(
        &self,
        secrets: &EmailSecrets,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<TestReport> {
        let Some(from) = secrets.from_email.as_deref() else {
            return Err(Error::configuration()
                .with_message("Email configuration is missing from_email"));
        };

        let message = EmailMessage {
            to,
            subject,
            html,
            text: None,
            from,
            reply_to: secrets.reply_to.as_deref(),
        };

        let via = match secrets.vendor {
            EmailVendor::Sendgrid => "SendGrid",
            EmailVendor::Mailgun => "Mailgun",
            EmailVendor::Resend => "Resend",
        };

        let receipt = self.send(secrets, &message).await?;
        if receipt.success {
            Ok(TestReport::ok(format!(
                "Test email sent successfully to {to} via {via}"
            )))
        } else {
            Ok(TestReport::failed(
                format!("{via} test failed"),
                receipt.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }

    /// Sends an email through the sub-provider the secrets select.
    pub async fn send(
        &self,
        secrets: &EmailSecrets,
        message: &EmailMessage<'_>,
    ) -> Result<DeliveryReceipt> {
        match secrets.vendor {
            EmailVendor::Sendgrid => Ok(self.send_sendgrid(secrets, message).await),
            EmailVendor::Mailgun => self.send_mailgun(secrets, message).await,
            EmailVendor::Resend => Ok(self.send_resend(secrets, message).await),
        }
    }

    async fn send_sendgrid(
        &self,
        secrets: &EmailSecrets,
        message: &EmailMessage<'_>,
    ) -> DeliveryReceipt {
        let endpoint = format!(
            "{}/v3/mail/send",
            self.sendgrid_api_base.trim_end_matches('/')
        );

        let mut content = vec![json!({ "type": "text/html", "value": message.html })];
        if let Some(text) = message.text {
            content.push(json!({ "type": "text/plain", "value": text }));
        }

        let mut payload = json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": { "email": message.from },
            "subject": message.subject,
            "content": content,
        });
        if let Some(reply_to) = message.reply_to {
            payload["reply_to"] = json!({ "email": reply_to });
        }

        let response = match self
            .http
            .post(&endpoint)
            .bearer_auth(&secrets.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => return DeliveryReceipt::failed(transport_error("SendGrid", &error)),
        };

        let http_status = response.status();
        if !http_status.is_success() {
            // SendGrid reports failures as a plain-text body
            let detail = response.text().await.unwrap_or_default();
            return DeliveryReceipt::failed(format!(
                "SendGrid API error: {} - {detail}",
                http_status.as_u16()
            ));
        }

        // 202 Accepted; the message id only appears in a response header
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        DeliveryReceipt::delivered(message_id)
    }

    async fn send_mailgun(
        &self,
        secrets: &EmailSecrets,
        message: &EmailMessage<'_>,
    ) -> Result<DeliveryReceipt> {
        let Some(domain) = secrets.mailgun_domain.as_deref() else {
            return Err(Error::configuration()
                .with_message("Mailgun configuration is missing mailgun_domain"));
        };

        let api_base = match secrets.mailgun_region {
            MailgunRegion::Us => &self.mailgun_us_api_base,
            MailgunRegion::Eu => &self.mailgun_eu_api_base,
        };
        let endpoint = format!("{}/v3/{domain}/messages", api_base.trim_end_matches('/'));

        let mut form = vec![
            ("from".to_string(), message.from.to_string()),
            ("to".to_string(), message.to.to_string()),
            ("subject".to_string(), message.subject.to_string()),
            ("html".to_string(), message.html.to_string()),
        ];
        if let Some(text) = message.text {
            form.push(("text".to_string(), text.to_string()));
        }
        if let Some(reply_to) = message.reply_to {
            form.push(("h:Reply-To".to_string(), reply_to.to_string()));
        }

        let response = match self
            .http
            .post(&endpoint)
            .basic_auth("api", Some(&secrets.api_key))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return Ok(DeliveryReceipt::failed(transport_error("Mailgun", &error)));
            }
        };

        let http_status = response.status();
        if !http_status.is_success() {
            // Mailgun reports failures as a plain-text body
            let detail = response.text().await.unwrap_or_default();
            return Ok(DeliveryReceipt::failed(format!(
                "Mailgun API error: {} - {detail}",
                http_status.as_u16()
            )));
        }

        let body: Option<Value> = response.json().await.ok();
        let message_id = body
            .as_ref()
            .and_then(|body| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(DeliveryReceipt::delivered(message_id))
    }

    async fn send_resend(
        &self,
        secrets: &EmailSecrets,
        message: &EmailMessage<'_>,
    ) -> DeliveryReceipt {
        let endpoint = format!("{}/emails", self.resend_api_base.trim_end_matches('/'));

        let mut payload = json!({
            "from": message.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        });
        if let Some(text) = message.text {
            payload["text"] = json!(text);
        }
        if let Some(reply_to) = message.reply_to {
            payload["reply_to"] = json!(reply_to);
        }

        let response = match self
            .http
            .post(&endpoint)
            .bearer_auth(&secrets.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => return DeliveryReceipt::failed(transport_error("Resend", &error)),
        };

        let http_status = response.status();
        let body: Option<Value> = response.json().await.ok();

        if http_status.is_success() {
            let message_id = body
                .as_ref()
                .and_then(|body| body.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return DeliveryReceipt::delivered(message_id);
        }

        // Resend reports failures as a JSON body with a message field
        let error = body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Resend API error: {}", http_status.as_u16()));
        DeliveryReceipt::failed(error)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use trellis_core::ErrorKind;

    use super::*;

    fn resend_bundle() -> SecretBundle {
        let mut bundle = SecretBundle::new();
        bundle.insert("provider", "resend");
        bundle.insert("api_key", "sk_x");
        bundle.insert("from_email", "a@b.com");
        bundle
    }

    fn message<'a>() -> EmailMessage<'a> {
        EmailMessage {
            to: "c@d.com",
            subject: "hello",
            html: "<p>hi</p>",
            text: Some("hi"),
            from: "a@b.com",
            reply_to: None,
        }
    }

    #[test]
    fn test_vendor_defaults_to_resend() {
        let mut bundle = resend_bundle();
        bundle.remove("provider");
        let secrets = EmailSecrets::try_from(&bundle).unwrap();
        assert_eq!(secrets.vendor, EmailVendor::Resend);
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let mut bundle = resend_bundle();
        bundle.remove("api_key");
        let error = EmailSecrets::try_from(&bundle).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_mailgun_requires_domain() {
        let mut bundle = resend_bundle();
        bundle.insert("provider", "mailgun");
        assert!(EmailSecrets::try_from(&bundle).is_err());

        bundle.insert("mailgun_domain", "mg.example.com");
        bundle.insert("mailgun_region", "eu");
        let secrets = EmailSecrets::try_from(&bundle).unwrap();
        assert_eq!(secrets.vendor, EmailVendor::Mailgun);
        assert_eq!(secrets.mailgun_region, MailgunRegion::Eu);
    }

    #[tokio::test]
    async fn test_resend_success_returns_json_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/emails")
                    .json_body_includes(r#"{"from": "a@b.com", "to": ["c@d.com"]}"#);
                then.status(200).json_body(json!({"id": "re_123"}));
            })
            .await;

        let client =
            EmailClient::new(&HttpConfig::default()).with_resend_api_base(server.url(""));
        let secrets = EmailSecrets::try_from(&resend_bundle()).unwrap();

        let receipt = client.send(&secrets, &message()).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.message_id.as_deref(), Some("re_123"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resend_error_is_json_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(422)
                    .json_body(json!({"message": "Invalid `from` address"}));
            })
            .await;

        let client =
            EmailClient::new(&HttpConfig::default()).with_resend_api_base(server.url(""));
        let secrets = EmailSecrets::try_from(&resend_bundle()).unwrap();

        let receipt = client.send(&secrets, &message()).await.unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.error.as_deref(), Some("Invalid `from` address"));
    }

    #[tokio::test]
    async fn test_sendgrid_id_comes_from_response_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/mail/send");
                then.status(202).header("x-message-id", "sg-777");
            })
            .await;

        let mut bundle = resend_bundle();
        bundle.insert("provider", "sendgrid");
        let secrets = EmailSecrets::try_from(&bundle).unwrap();

        let client =
            EmailClient::new(&HttpConfig::default()).with_sendgrid_api_base(server.url(""));
        let receipt = client.send(&secrets, &message()).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.message_id.as_deref(), Some("sg-777"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sendgrid_error_is_plain_text_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).body("authorization required");
            })
            .await;

        let mut bundle = resend_bundle();
        bundle.insert("provider", "sendgrid");
        let secrets = EmailSecrets::try_from(&bundle).unwrap();

        let client =
            EmailClient::new(&HttpConfig::default()).with_sendgrid_api_base(server.url(""));
        let receipt = client.send(&secrets, &message()).await.unwrap();

        assert!(!receipt.success);
        let error = receipt.error.unwrap();
        assert!(error.contains("401"));
        assert!(error.contains("authorization required"));
    }

    #[tokio::test]
    async fn test_mailgun_posts_form_to_domain_path() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/mg.example.com/messages")
                    .body_includes("subject=hello");
                then.status(200)
                    .json_body(json!({"id": "<20250630.mg.example.com>"}));
            })
            .await;

        let mut bundle = resend_bundle();
        bundle.insert("provider", "mailgun");
        bundle.insert("mailgun_domain", "mg.example.com");
        let secrets = EmailSecrets::try_from(&bundle).unwrap();

        let client =
            EmailClient::new(&HttpConfig::default()).with_mailgun_api_base(server.url(""));
        let receipt = client.send(&secrets, &message()).await.unwrap();

        assert!(receipt.success);
        assert_eq!(
            receipt.message_id.as_deref(),
            Some("<20250630.mg.example.com>")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_test_requires_from_email() {
        let mut bundle = resend_bundle();
        bundle.remove("from_email");
        let secrets = EmailSecrets::try_from(&bundle).unwrap();

        let client = EmailClient::new(&HttpConfig::default());
        let error = client
            .test(&secrets, "c@d.com", "hello", "<p>hi</p>")
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }
}
