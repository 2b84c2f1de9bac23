//! QuickBooks Online accounting adapter.
//!
//! QuickBooks access tokens are short-lived, so every data call is preceded
//! by a refresh-token exchange; access tokens are never cached across calls.
//! A missing refresh token is a distinct, more actionable condition than a
//! failed exchange: it means the tenant must re-run the authorization flow,
//! not that the network or credentials misbehaved. The OAuth browser flow
//! itself happens elsewhere; this adapter only consumes the resulting
//! refresh token from the secret bundle.

use serde_json::Value;
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use trellis_core::{Error, ErrorKind, Result};

use super::{TestReport, transport_error};
use crate::http::HttpConfig;
use crate::secrets::SecretBundle;

/// Production OAuth token endpoint.
pub const QUICKBOOKS_OAUTH_BASE: &str = "https://appcenter.intuit.com";

/// Production data API endpoint.
pub const QUICKBOOKS_API_BASE: &str = "https://quickbooks.api.intuit.com";

/// Sandbox data API endpoint.
pub const QUICKBOOKS_SANDBOX_API_BASE: &str = "https://sandbox-quickbooks.api.intuit.com";

/// QuickBooks serving environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum QuickBooksEnvironment {
    /// Sandbox companies (default).
    #[default]
    Sandbox,
    /// Production companies.
    Production,
}

/// Process-wide QuickBooks app credentials.
///
/// The OAuth client id and secret identify the Trellis application itself,
/// not a tenant, so they are configuration rather than tenant secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct QuickBooksConfig {
    /// OAuth client id
    #[cfg_attr(feature = "config", arg(long = "qbo-client-id", env = "QBO_CLIENT_ID"))]
    pub client_id: String,

    /// OAuth client secret
    #[cfg_attr(
        feature = "config",
        arg(long = "qbo-client-secret", env = "QBO_CLIENT_SECRET")
    )]
    pub client_secret: String,

    /// Serving environment
    #[cfg_attr(
        feature = "config",
        arg(long = "qbo-env", env = "QBO_ENV", default_value = "sandbox")
    )]
    #[serde(default)]
    pub environment: QuickBooksEnvironment,
}

/// Typed credentials for the QuickBooks integration.
///
/// Both fields are written by the OAuth callback; either may be absent when
/// the tenant has not completed authorization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuickBooksSecrets {
    /// Long-lived refresh token from the OAuth flow.
    pub refresh_token: Option<String>,
    /// Company (realm) identifier.
    pub realm_id: Option<String>,
}

impl From<&SecretBundle> for QuickBooksSecrets {
    fn from(bundle: &SecretBundle) -> Self {
        Self {
            refresh_token: bundle.get_str("refresh_token").map(str::to_string),
            realm_id: bundle.get_str("realm_id").map(str::to_string),
        }
    }
}

/// HTTP client for QuickBooks Online.
#[derive(Debug, Clone)]
pub struct QuickBooksClient {
    http: reqwest::Client,
    config: QuickBooksConfig,
    oauth_base: String,
    api_base: String,
}

impl QuickBooksClient {
    /// Creates a new client against the production endpoints.
    pub fn new(http_config: &HttpConfig, config: QuickBooksConfig) -> Self {
        let api_base = match config.environment {
            QuickBooksEnvironment::Sandbox => QUICKBOOKS_SANDBOX_API_BASE,
            QuickBooksEnvironment::Production => QUICKBOOKS_API_BASE,
        };

        Self {
            http: http_config.build_client(),
            config,
            oauth_base: QUICKBOOKS_OAUTH_BASE.to_string(),
            api_base: api_base.to_string(),
        }
    }

    /// Overrides the OAuth endpoint (used by tests).
    #[must_use]
    pub fn with_oauth_base(mut self, oauth_base: impl Into<String>) -> Self {
        self.oauth_base = oauth_base.into();
        self
    }

    /// Overrides the data API endpoint (used by tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Exchanges the stored refresh token for a short-lived access token.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NotConnected`] when no refresh token is stored: the
    ///   tenant must re-authorize, retrying cannot help
    /// - [`ErrorKind::ProviderAuth`] when the exchange is rejected
    /// - [`ErrorKind::Network`] on transport failures
    pub async fn access_token(&self, secrets: &QuickBooksSecrets) -> Result<String> {
        let Some(refresh_token) = secrets.refresh_token.as_deref() else {
            return Err(Error::not_connected().with_message(
                "No refresh token found. Please connect QuickBooks first.",
            ));
        };

        let endpoint = format!(
            "{}/connect/oauth2/v1/tokens/bearer",
            self.oauth_base.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&endpoint)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|error| {
                Error::network().with_message(transport_error("QuickBooks token refresh", &error))
            })?;

        let http_status = response.status();
        if !http_status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::provider_auth().with_message(format!(
                "Token refresh failed: {} - {detail}",
                http_status.as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(|error| {
            Error::network().with_message(transport_error("QuickBooks token refresh", &error))
        })?;

        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::provider_auth()
                    .with_message("Token refresh response did not include an access token")
            })
    }

    /// Fetches the connected company's display name.
    pub async fn company_name(&self, access_token: &str, realm_id: &str) -> Result<String> {
        let endpoint = format!(
            "{}/v3/company/{realm_id}/companyinfo/{realm_id}",
            self.api_base.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| {
                Error::network().with_message(transport_error("QuickBooks company info", &error))
            })?;

        let http_status = response.status();
        if !http_status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::provider_validation().with_message(format!(
                "Failed to fetch company: {} - {detail}",
                http_status.as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(|error| {
            Error::network().with_message(transport_error("QuickBooks company info", &error))
        })?;

        let company = body
            .pointer("/QueryResponse/CompanyInfo/0")
            .or_else(|| body.get("CompanyInfo"));
        Ok(company
            .and_then(|company| company.get("CompanyName"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string())
    }

    /// Verifies the stored connection end to end: token exchange followed by
    /// a company-info fetch.
    pub async fn test(&self, secrets: &QuickBooksSecrets) -> Result<TestReport> {
        let access_token = match self.access_token(secrets).await {
            Ok(token) => token,
            Err(error) if error.kind == ErrorKind::NotConnected => {
                return Ok(TestReport::failed(
                    "QuickBooks not connected",
                    error
                        .message
                        .unwrap_or_else(|| "No refresh token found".to_string()),
                ));
            }
            Err(error) => {
                return Ok(TestReport::failed(
                    "QuickBooks connection failed",
                    error
                        .message
                        .unwrap_or_else(|| "Failed to refresh access token".to_string()),
                ));
            }
        };

        let Some(realm_id) = secrets.realm_id.as_deref() else {
            return Ok(TestReport::failed(
                "QuickBooks connection test failed",
                "Realm ID not found",
            ));
        };

        match self.company_name(&access_token, realm_id).await {
            Ok(company_name) => Ok(TestReport::ok(format!(
                "Connected to QuickBooks company: {company_name}"
            ))),
            Err(error) => Ok(TestReport::failed(
                "QuickBooks connection test failed",
                error
                    .message
                    .unwrap_or_else(|| "Failed to fetch company info".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn config() -> QuickBooksConfig {
        QuickBooksConfig {
            client_id: "app-id".to_string(),
            client_secret: "app-secret".to_string(),
            environment: QuickBooksEnvironment::Sandbox,
        }
    }

    fn secrets() -> QuickBooksSecrets {
        QuickBooksSecrets {
            refresh_token: Some("rt-123".to_string()),
            realm_id: Some("9341".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_refresh_token_short_circuits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({"access_token": "at"}));
            })
            .await;

        let client = QuickBooksClient::new(&HttpConfig::default(), config())
            .with_oauth_base(server.url(""))
            .with_api_base(server.url(""));

        let report = client.test(&QuickBooksSecrets::default()).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.message, "QuickBooks not connected");
        assert!(report.error.unwrap().contains("connect QuickBooks first"));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_refresh_happens_before_every_data_call() {
        let server = MockServer::start_async().await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/connect/oauth2/v1/tokens/bearer")
                    .body_includes("grant_type=refresh_token");
                then.status(200).json_body(json!({"access_token": "at-1"}));
            })
            .await;
        let company = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v3/company/9341/companyinfo/9341")
                    .header("authorization", "Bearer at-1");
                then.status(200).json_body(json!({
                    "QueryResponse": {"CompanyInfo": [{"CompanyName": "Hillside Lawn Care"}]}
                }));
            })
            .await;

        let client = QuickBooksClient::new(&HttpConfig::default(), config())
            .with_oauth_base(server.url(""))
            .with_api_base(server.url(""));

        let report = client.test(&secrets()).await.unwrap();
        assert!(report.success);
        assert!(report.message.contains("Hillside Lawn Care"));

        let report = client.test(&secrets()).await.unwrap();
        assert!(report.success);

        // No access-token caching across calls
        token.assert_hits_async(2).await;
        company.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_provider_auth() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400).body("invalid_grant");
            })
            .await;

        let client = QuickBooksClient::new(&HttpConfig::default(), config())
            .with_oauth_base(server.url(""));

        let error = client.access_token(&secrets()).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::ProviderAuth);
        assert!(error.message.unwrap().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_missing_realm_id_fails_without_data_call() {
        let server = MockServer::start_async().await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST).path("/connect/oauth2/v1/tokens/bearer");
                then.status(200).json_body(json!({"access_token": "at-1"}));
            })
            .await;
        let company = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = QuickBooksClient::new(&HttpConfig::default(), config())
            .with_oauth_base(server.url(""))
            .with_api_base(server.url(""));

        let mut without_realm = secrets();
        without_realm.realm_id = None;
        let report = client.test(&without_realm).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("Realm ID not found"));
        token.assert_hits_async(1).await;
        company.assert_hits_async(0).await;
    }
}
