//! Outbound message and delivery result types.

use serde::Serialize;
use url::Url;

/// One outbound message, channel-agnostic.
///
/// `subject` and `html` only apply to email; `media` routes SMS deliveries
/// through the carrier's MMS path and attaches to WhatsApp messages.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Destination: a phone number or an email address, depending on channel.
    pub to: String,
    /// Plain-text body.
    pub body: String,
    /// Email subject line.
    pub subject: Option<String>,
    /// Email HTML body; falls back to the plain-text body when unset.
    pub html: Option<String>,
    /// Sender override (a DID or from-address), when the tenant has several.
    pub from: Option<String>,
    /// Media attachments, by URL.
    pub media: Vec<Url>,
}

impl OutboundMessage {
    /// Creates a plain-text message.
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
            subject: None,
            html: None,
            from: None,
            media: Vec::new(),
        }
    }

    /// Sets the email subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the email HTML body.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the sender override.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Attaches media by URL.
    #[must_use]
    pub fn with_media(mut self, media: Vec<Url>) -> Self {
        self.media = media;
        self
    }
}

/// Result of one routed delivery.
///
/// Transient: callers that keep a message log own that persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Whether the message was handed to a provider successfully.
    pub success: bool,
    /// Provider-assigned message identifier, when available.
    pub message_id: Option<String>,
    /// Failure detail, when unsuccessful.
    pub error: Option<String>,
    /// Which provider (or sub-provider) actually handled the attempt.
    pub provider: Option<String>,
}

impl DeliveryResult {
    /// Creates a successful result attributed to a provider.
    pub fn delivered(provider: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
            provider: Some(provider.into()),
        }
    }

    /// Creates a failed result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            provider: None,
        }
    }

    /// Attributes this result to a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}
