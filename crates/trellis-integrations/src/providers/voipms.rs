//! VoIP.ms SMS & MMS adapter.
//!
//! VoIP.ms exposes a GET-based REST API authenticated with the account's API
//! username and API password. Destinations and sender DIDs use 10-digit NANP
//! numbers; 11-digit inputs with a leading country code are trimmed before
//! use, and a sender DID that does not normalize to exactly 10 digits is
//! rejected before any network call.

use serde_json::Value;
use trellis_core::{Error, Result};
use url::Url;

use super::{DeliveryReceipt, TestReport, transport_error};
use crate::http::HttpConfig;
use crate::secrets::SecretBundle;

const TRACING_TARGET: &str = "trellis_integrations::providers::voipms";

/// Production API endpoint.
pub const VOIPMS_API_BASE: &str = "https://voip.ms/api/v1/rest.php";

/// Maximum media attachments accepted per MMS.
const MAX_MMS_MEDIA: usize = 5;

/// Normalizes a phone number to 10-digit NANP form.
///
/// Strips every non-digit character, then trims the leading `1` country code
/// from 11-digit numbers. Inputs that are not NANP-shaped pass through as
/// their bare digits.
#[must_use]
pub fn normalize_nanp_digits(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// VoIP.ms flags non-ASCII message bodies so emoji and accented characters
/// survive the carrier hop.
fn is_unicode_message(text: &str) -> bool {
    !text.is_ascii()
}

/// Typed credentials for the VoIP.ms integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoipMsSecrets {
    /// Account API username.
    pub username: String,
    /// API password (not the account login password).
    pub api_password: String,
    /// Default outbound DID when the caller does not override the sender.
    pub default_did: String,
    /// Webhook URL configured in the VoIP.ms dashboard.
    pub webhook_secret: Option<String>,
}

impl TryFrom<&SecretBundle> for VoipMsSecrets {
    type Error = Error;

    fn try_from(bundle: &SecretBundle) -> Result<Self> {
        let username = bundle.get_str("username");
        let api_password = bundle.get_str("api_password");
        let default_did = bundle.get_str("default_did");

        let (Some(username), Some(api_password), Some(default_did)) =
            (username, api_password, default_did)
        else {
            return Err(Error::configuration().with_message(
                "VoIP.ms credentials not configured: missing username, api_password, or default_did",
            ));
        };

        Ok(Self {
            username: username.to_string(),
            api_password: api_password.to_string(),
            default_did: default_did.to_string(),
            webhook_secret: bundle.get_str("webhook_secret").map(str::to_string),
        })
    }
}

/// HTTP client for the VoIP.ms REST API.
#[derive(Debug, Clone)]
pub struct VoipMsClient {
    http: reqwest::Client,
    api_base: String,
}

impl VoipMsClient {
    /// Creates a new client against the production endpoint.
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            http: config.build_client(),
            api_base: VOIPMS_API_BASE.to_string(),
        }
    }

    /// Overrides the API endpoint (used by tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sends a probe SMS to verify the stored credentials end to end.
    pub async fn test_sms(
        &self,
        secrets: &VoipMsSecrets,
        to: &str,
        message: &str,
    ) -> Result<TestReport> {
        let did = validated_sender_did(&secrets.default_did)?;

        let params = sms_params(secrets, &did, to, message, "sendSMS");
        let response = match self.http.get(&self.api_base).query(&params).send().await {
            Ok(response) => response,
            Err(error) => {
                return Ok(TestReport::failed(
                    "VoIP.ms SMS test failed",
                    transport_error("VoIP.ms", &error),
                ));
            }
        };

        if !response.status().is_success() {
            return Ok(TestReport::failed(
                "VoIP.ms SMS test failed",
                format!("HTTP {}", response.status().as_u16()),
            ));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                return Ok(TestReport::failed(
                    "VoIP.ms SMS test failed",
                    transport_error("VoIP.ms", &error),
                ));
            }
        };

        if response_is_success(&body) {
            return Ok(TestReport::ok(format!(
                "Test SMS sent successfully to {to} via VoIP.ms"
            )));
        }

        let error = extract_error(&body, "Unknown error from VoIP.ms");
        Ok(TestReport::failed(
            "VoIP.ms SMS test failed",
            annotate_error(error, &did),
        ))
    }

    /// Sends an SMS.
    ///
    /// `from_did` overrides the stored default sender DID.
    pub async fn send_sms(
        &self,
        secrets: &VoipMsSecrets,
        to: &str,
        message: &str,
        from_did: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        let did = validated_sender_did(from_did.unwrap_or(&secrets.default_did))?;

        let params = sms_params(secrets, &did, to, message, "sendSMS");
        Ok(self.dispatch("VoIP.ms SMS", &params).await)
    }

    /// Sends an MMS with media attachments.
    ///
    /// VoIP.ms accounts disagree on the attachment convention, so delivery
    /// tries `sendMMS` with `media1..n` first and falls back to `sendSMS`
    /// with `media_url1..n`, returning the first success or the last
    /// failure. Attempts are strictly sequential: the provider may charge or
    /// queue on each one, so they are never raced.
    ///
    /// `public_host` names the host whose media URLs are downgraded from
    /// HTTPS to HTTP; the VoIP.ms media fetcher was observed to fail on TLS
    /// for self-hosted uploads, and no other provider gets this rewrite.
    pub async fn send_mms(
        &self,
        secrets: &VoipMsSecrets,
        to: &str,
        message: &str,
        media_urls: &[Url],
        from_did: Option<&str>,
        public_host: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        if media_urls.is_empty() {
            return Err(
                Error::configuration().with_message("MMS requires at least one media URL")
            );
        }

        let did = validated_sender_did(from_did.unwrap_or(&secrets.default_did))?;

        let mut last_error: Option<String> = None;
        for (label, params) in mms_attempts(secrets, &did, to, message, media_urls, public_host) {
            tracing::debug!(
                target: TRACING_TARGET,
                attempt = label,
                to = %normalize_nanp_digits(to),
                media_count = media_urls.len().min(MAX_MMS_MEDIA),
                "Attempting VoIP.ms MMS delivery"
            );

            let receipt = self.dispatch(label, &params).await;
            if receipt.success {
                return Ok(receipt);
            }
            last_error = receipt.error;
        }

        Ok(DeliveryReceipt::failed(
            last_error.unwrap_or_else(|| "VoIP.ms MMS failed".to_string()),
        ))
    }

    /// Issues one API call and folds every failure mode into a receipt.
    async fn dispatch(&self, context: &str, params: &[(String, String)]) -> DeliveryReceipt {
        let response = match self.http.get(&self.api_base).query(params).send().await {
            Ok(response) => response,
            Err(error) => return DeliveryReceipt::failed(transport_error(context, &error)),
        };

        let http_status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => return DeliveryReceipt::failed(transport_error(context, &error)),
        };

        let body: Option<Value> = serde_json::from_str(&text).ok();

        let Some(body) = body else {
            return DeliveryReceipt::failed(if http_status.is_success() {
                format!("{context} returned an unparseable response")
            } else {
                format!("HTTP {}", http_status.as_u16())
            });
        };

        if response_is_success(&body) {
            return DeliveryReceipt::delivered(extract_message_id(&body));
        }

        let fallback = if http_status.is_success() {
            format!("{context} failed")
        } else {
            format!("HTTP {}", http_status.as_u16())
        };
        DeliveryReceipt::failed(extract_error(&body, &fallback))
    }
}

/// Normalizes and validates the sender DID before any network call.
///
/// A request with a malformed sender is known-bad; sending it anyway would
/// only convert a local validation error into a provider roundtrip.
fn validated_sender_did(input: &str) -> Result<String> {
    let did = normalize_nanp_digits(input);
    if did.len() != 10 {
        return Err(Error::configuration().with_message(format!(
            "Invalid DID format. Expected 10 digits (NANP). Got {} digits after normalization.",
            did.len()
        )));
    }
    Ok(did)
}

fn sms_params(
    secrets: &VoipMsSecrets,
    did: &str,
    to: &str,
    message: &str,
    method: &str,
) -> Vec<(String, String)> {
    vec![
        ("api_username".to_string(), secrets.username.clone()),
        ("api_password".to_string(), secrets.api_password.clone()),
        ("method".to_string(), method.to_string()),
        ("did".to_string(), did.to_string()),
        ("dst".to_string(), normalize_nanp_digits(to)),
        ("message".to_string(), message.to_string()),
        (
            "unicode".to_string(),
            if is_unicode_message(message) { "1" } else { "0" }.to_string(),
        ),
    ]
}

/// Builds both attachment-convention parameter sets, in attempt order.
fn mms_attempts(
    secrets: &VoipMsSecrets,
    did: &str,
    to: &str,
    message: &str,
    media_urls: &[Url],
    public_host: Option<&str>,
) -> Vec<(&'static str, Vec<(String, String)>)> {
    // VoIP.ms silently misbehaves on an empty MMS text field; substitute a
    // minimal body so recipients do not see a bare "MMS message".
    let message = if message.trim().is_empty() {
        "."
    } else {
        message.trim()
    };

    let media: Vec<String> = media_urls
        .iter()
        .take(MAX_MMS_MEDIA)
        .map(|url| rewrite_media_url(url, public_host))
        .collect();

    let mut first = sms_params(secrets, did, to, message, "sendMMS");
    for (index, url) in media.iter().enumerate() {
        first.push((format!("media{}", index + 1), url.clone()));
    }

    let mut second = sms_params(secrets, did, to, message, "sendSMS");
    for (index, url) in media.iter().enumerate() {
        second.push((format!("media_url{}", index + 1), url.clone()));
    }

    vec![("sendMMS(media1..)", first), ("sendSMS(media_url1..)", second)]
}

/// Downgrades HTTPS media URLs on the configured public host to HTTP.
fn rewrite_media_url(url: &Url, public_host: Option<&str>) -> String {
    let on_public_host = match (url.host_str(), public_host) {
        (Some(host), Some(public)) => host.eq_ignore_ascii_case(public),
        _ => false,
    };

    if url.scheme() == "https" && on_public_host {
        let mut rewritten = url.clone();
        if rewritten.set_scheme("http").is_ok() {
            return rewritten.to_string();
        }
    }
    url.to_string()
}

fn response_is_success(body: &Value) -> bool {
    body.get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| status.eq_ignore_ascii_case("success"))
}

fn extract_message_id(body: &Value) -> Option<String> {
    for candidate in [
        body.pointer("/sms/id"),
        body.get("id"),
        body.get("message_id"),
    ] {
        match candidate {
            Some(Value::String(id)) if !id.is_empty() => return Some(id.clone()),
            Some(Value::Number(id)) => return Some(id.to_string()),
            _ => {}
        }
    }
    None
}

fn extract_error(body: &Value, fallback: &str) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Appends remediation hints for the failure modes operators hit most.
fn annotate_error(error: String, did: &str) -> String {
    if error.contains("Username or Password") || error.contains("incorrect") {
        format!(
            "{error}. Note: VoIP.ms requires an API Password (not your login password). \
             Get it from: VoIP.ms Dashboard → Settings → API → Generate API Password"
        )
    } else if error.contains("DID") || error.contains("not a valid") {
        format!("{error} (DID used: {did})")
    } else {
        error
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use trellis_core::ErrorKind;

    use super::*;

    fn secrets() -> VoipMsSecrets {
        VoipMsSecrets {
            username: "tenant_user".to_string(),
            api_password: "api-pass".to_string(),
            default_did: "+15551234567".to_string(),
            webhook_secret: None,
        }
    }

    fn client(base: String) -> VoipMsClient {
        VoipMsClient::new(&HttpConfig::default()).with_api_base(base)
    }

    #[test]
    fn test_normalize_nanp_digits_equivalent_forms() {
        assert_eq!(normalize_nanp_digits("+15551234567"), "5551234567");
        assert_eq!(normalize_nanp_digits("15551234567"), "5551234567");
        assert_eq!(normalize_nanp_digits("5551234567"), "5551234567");
        assert_eq!(normalize_nanp_digits("(555) 123-4567"), "5551234567");
    }

    #[test]
    fn test_normalize_preserves_non_nanp_digits() {
        assert_eq!(normalize_nanp_digits("441632960961"), "441632960961");
        assert_eq!(normalize_nanp_digits("123"), "123");
    }

    #[test]
    fn test_unicode_detection() {
        assert!(!is_unicode_message("plain ascii text"));
        assert!(is_unicode_message("café"));
        assert!(is_unicode_message("👍"));
    }

    #[test]
    fn test_mms_attempts_substitutes_placeholder_body() {
        let secrets = secrets();
        let url = Url::parse("https://cdn.example.com/a.jpg").unwrap();
        let attempts = mms_attempts(&secrets, "5551234567", "5559876543", "   ", &[url], None);

        for (_, params) in &attempts {
            let body = params.iter().find(|(k, _)| k == "message").unwrap();
            assert_eq!(body.1, ".");
        }
    }

    #[test]
    fn test_mms_attempts_caps_media_at_five() {
        let secrets = secrets();
        let urls: Vec<Url> = (0..7)
            .map(|i| Url::parse(&format!("https://cdn.example.com/{i}.jpg")).unwrap())
            .collect();
        let attempts = mms_attempts(&secrets, "5551234567", "5559876543", "hi", &urls, None);

        let (_, first) = &attempts[0];
        assert!(first.iter().any(|(k, _)| k == "media5"));
        assert!(!first.iter().any(|(k, _)| k == "media6"));
    }

    #[test]
    fn test_media_url_rewrite_only_on_public_host() {
        let own = Url::parse("https://app.example.com/uploads/a.jpg").unwrap();
        let other = Url::parse("https://cdn.example.com/b.jpg").unwrap();

        assert_eq!(
            rewrite_media_url(&own, Some("app.example.com")),
            "http://app.example.com/uploads/a.jpg"
        );
        assert_eq!(
            rewrite_media_url(&other, Some("app.example.com")),
            "https://cdn.example.com/b.jpg"
        );
        assert_eq!(
            rewrite_media_url(&own, None),
            "https://app.example.com/uploads/a.jpg"
        );
    }

    #[tokio::test]
    async fn test_invalid_sender_did_rejected_before_any_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({"status": "success"}));
            })
            .await;

        let client = client(server.url("/"));
        let mut bad = secrets();
        bad.default_did = "555123".to_string();

        let error = client
            .send_sms(&bad, "5559876543", "hi", None)
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
        assert!(error.message.unwrap().contains("10 digits"));

        let error = client.test_sms(&bad, "5559876543", "hi").await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);

        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_send_sms_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .query_param("method", "sendSMS")
                    .query_param("did", "5551234567")
                    .query_param("dst", "5559876543")
                    .query_param("unicode", "0");
                then.status(200)
                    .json_body(json!({"status": "success", "sms": {"id": 4321}}));
            })
            .await;

        let client = client(server.url("/"));
        let receipt = client
            .send_sms(&secrets(), "+15559876543", "hi", None)
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.message_id.as_deref(), Some("4321"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_sms_sets_unicode_flag() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).query_param("unicode", "1");
                then.status(200).json_body(json!({"status": "success"}));
            })
            .await;

        let client = client(server.url("/"));
        let receipt = client
            .send_sms(&secrets(), "5559876543", "on my way 👍", None)
            .await
            .unwrap();

        assert!(receipt.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_sms_provider_failure_is_receipt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .json_body(json!({"status": "error", "message": "Invalid destination"}));
            })
            .await;

        let client = client(server.url("/"));
        let receipt = client
            .send_sms(&secrets(), "5559876543", "hi", None)
            .await
            .unwrap();

        assert!(!receipt.success);
        assert_eq!(receipt.error.as_deref(), Some("Invalid destination"));
    }

    #[tokio::test]
    async fn test_mms_falls_back_to_second_convention() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).query_param("method", "sendMMS");
                then.status(200)
                    .json_body(json!({"status": "error", "message": "no such method"}));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .query_param("method", "sendSMS")
                    .query_param_exists("media_url1");
                then.status(200)
                    .json_body(json!({"status": "success", "id": "mms-77"}));
            })
            .await;

        let client = client(server.url("/"));
        let media = [Url::parse("https://cdn.example.com/a.jpg").unwrap()];
        let receipt = client
            .send_mms(&secrets(), "5559876543", "photo", &media, None, None)
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.message_id.as_deref(), Some("mms-77"));
        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_mms_returns_last_error_when_both_conventions_fail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).query_param("method", "sendMMS");
                then.status(200)
                    .json_body(json!({"status": "error", "message": "first failed"}));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).query_param("method", "sendSMS");
                then.status(200)
                    .json_body(json!({"status": "error", "message": "second failed"}));
            })
            .await;

        let client = client(server.url("/"));
        let media = [Url::parse("https://cdn.example.com/a.jpg").unwrap()];
        let receipt = client
            .send_mms(&secrets(), "5559876543", "photo", &media, None, None)
            .await
            .unwrap();

        assert!(!receipt.success);
        assert_eq!(receipt.error.as_deref(), Some("second failed"));
        second.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_mms_without_media_is_configuration_error() {
        let client = client("http://127.0.0.1:1/".to_string());
        let error = client
            .send_mms(&secrets(), "5559876543", "hi", &[], None, None)
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_secrets_conversion_requires_core_fields() {
        let mut bundle = SecretBundle::new();
        bundle.insert("username", "tenant_user");

        let error = VoipMsSecrets::try_from(&bundle).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);

        bundle.insert("api_password", "api-pass");
        bundle.insert("default_did", "+15551234567");
        let secrets = VoipMsSecrets::try_from(&bundle).unwrap();
        assert_eq!(secrets.default_did, "+15551234567");
    }

    #[test]
    fn test_credential_error_hint() {
        let hinted = annotate_error("Username or Password incorrect".to_string(), "5551234567");
        assert!(hinted.contains("API Password"));

        let did_hint = annotate_error("did is not a valid DID".to_string(), "5551234567");
        assert!(did_hint.contains("(DID used: 5551234567)"));
    }
}
