//! Channel router: logical channel → configured provider → adapter.

use trellis_integrations::providers::{
    DeliveryReceipt, EmailClient, EmailSecrets, VoipMsClient, VoipMsSecrets, WhatsAppClient,
    WhatsAppSecrets, WhatsAppVendor,
};
use trellis_integrations::providers::email::{EmailMessage, EmailVendor};
use trellis_integrations::{
    ConnectionBackend, ConnectionStatus, ConnectionStore, HealthManager, HttpConfig, SecretBundle,
};
use uuid::Uuid;

use crate::{Channel, DeliveryResult, MessagingDefaults, OutboundMessage, TRACING_TARGET};

/// Routes outbound messages to the tenant's configured provider per channel.
///
/// The router performs no retries of its own: the only multi-attempt
/// behaviors are the carrier's internal MMS dual-convention fallback and the
/// explicit [`send_with_fallback`] chain, both strictly sequential.
///
/// [`send_with_fallback`]: MessageRouter::send_with_fallback
#[derive(Debug, Clone)]
pub struct MessageRouter<B> {
    store: ConnectionStore<B>,
    health: HealthManager<B>,
    defaults: MessagingDefaults,
    voipms: VoipMsClient,
    whatsapp: WhatsAppClient,
    email: EmailClient,
}

impl<B: ConnectionBackend> MessageRouter<B> {
    /// Creates a router over the store and health manager, with adapters
    /// built from the shared HTTP configuration.
    pub fn new(
        store: ConnectionStore<B>,
        health: HealthManager<B>,
        http_config: &HttpConfig,
        defaults: MessagingDefaults,
    ) -> Self {
        Self {
            store,
            health,
            defaults,
            voipms: VoipMsClient::new(http_config),
            whatsapp: WhatsAppClient::new(http_config),
            email: EmailClient::new(http_config),
        }
    }

    /// Replaces the SMS adapter (used by tests).
    #[must_use]
    pub fn with_voipms_client(mut self, client: VoipMsClient) -> Self {
        self.voipms = client;
        self
    }

    /// Replaces the WhatsApp adapter (used by tests).
    #[must_use]
    pub fn with_whatsapp_client(mut self, client: WhatsAppClient) -> Self {
        self.whatsapp = client;
        self
    }

    /// Replaces the email adapter (used by tests).
    #[must_use]
    pub fn with_email_client(mut self, client: EmailClient) -> Self {
        self.email = client;
        self
    }

    /// Sends a message via one channel.
    ///
    /// Resolves the tenant's secrets for the channel's provider; when none
    /// exist the result is a "`<channel> not configured`" failure with zero
    /// network I/O. Delivery outcomes that reached the provider are reported
    /// to the health manager; configuration-class failures that never left
    /// the process are not, so a malformed one-off request cannot make a
    /// healthy integration look broken.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET,
        fields(channel = %channel, %tenant)
    )]
    pub async fn send(
        &self,
        channel: Channel,
        tenant: Uuid,
        message: &OutboundMessage,
    ) -> DeliveryResult {
        let provider = channel.provider();

        let secrets = match self.store.get_secrets(tenant, provider).await {
            Ok(Some(secrets)) => secrets,
            Ok(None) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    channel = %channel,
                    "No stored configuration; delivery short-circuits"
                );
                return DeliveryResult::failure(channel.not_configured_error());
            }
            Err(error) => return DeliveryResult::failure(error.to_string()),
        };

        let attempt = match channel {
            Channel::Sms => self.send_sms(&secrets, message).await,
            Channel::Whatsapp => self.send_whatsapp(&secrets, message).await,
            Channel::Email => self.send_email(&secrets, message).await,
        };

        match attempt {
            Ok((provider_label, receipt)) => {
                self.report_outcome(tenant, channel, &receipt).await;

                if receipt.success {
                    DeliveryResult::delivered(provider_label, receipt.message_id)
                } else {
                    DeliveryResult::failure(
                        receipt.error.unwrap_or_else(|| "Unknown error".to_string()),
                    )
                    .with_provider(provider_label)
                }
            }
            // Configuration-class failures never reached the provider and
            // must not flip a previously healthy status
            Err(error) => DeliveryResult::failure(
                error
                    .message
                    .unwrap_or_else(|| "invalid configuration".to_string()),
            ),
        }
    }

    /// Tries each channel in the caller-supplied order, stopping at the
    /// first success.
    ///
    /// Attempts are strictly sequential: a later channel is only tried after
    /// the prior outcome is known, since providers may charge or queue per
    /// attempt. When every channel fails, the synthetic result names the
    /// attempted channels; callers needing per-channel diagnostics call
    /// [`send`](MessageRouter::send) per channel instead.
    pub async fn send_with_fallback(
        &self,
        channels: &[Channel],
        tenant: Uuid,
        message: &OutboundMessage,
    ) -> DeliveryResult {
        for channel in channels {
            let result = self.send(*channel, tenant, message).await;
            if result.success {
                return result;
            }

            tracing::debug!(
                target: TRACING_TARGET,
                channel = %channel,
                error = result.error.as_deref().unwrap_or_default(),
                "Channel failed; falling back to next"
            );
        }

        DeliveryResult::failure(format!(
            "Failed to send via all channels: {}",
            channels
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    async fn send_sms(
        &self,
        bundle: &SecretBundle,
        message: &OutboundMessage,
    ) -> trellis_core::Result<(String, DeliveryReceipt)> {
        let secrets = VoipMsSecrets::try_from(bundle)?;

        let receipt = if message.media.is_empty() {
            self.voipms
                .send_sms(
                    &secrets,
                    &message.to,
                    &message.body,
                    message.from.as_deref(),
                )
                .await?
        } else {
            self.voipms
                .send_mms(
                    &secrets,
                    &message.to,
                    &message.body,
                    &message.media,
                    message.from.as_deref(),
                    self.store.public_host(),
                )
                .await?
        };

        Ok(("voipms_sms".to_string(), receipt))
    }

    async fn send_whatsapp(
        &self,
        bundle: &SecretBundle,
        message: &OutboundMessage,
    ) -> trellis_core::Result<(String, DeliveryReceipt)> {
        let secrets = WhatsAppSecrets::try_from(bundle)?;
        let label = match secrets.vendor() {
            WhatsAppVendor::Twilio => "twilio",
            WhatsAppVendor::Meta => "meta",
        };

        let receipt = self
            .whatsapp
            .send(
                &secrets,
                &message.to,
                &message.body,
                message.media.first(),
            )
            .await?;

        Ok((label.to_string(), receipt))
    }

    async fn send_email(
        &self,
        bundle: &SecretBundle,
        message: &OutboundMessage,
    ) -> trellis_core::Result<(String, DeliveryReceipt)> {
        let secrets = EmailSecrets::try_from(bundle)?;
        let label = match secrets.vendor {
            EmailVendor::Sendgrid => "sendgrid",
            EmailVendor::Mailgun => "mailgun",
            EmailVendor::Resend => "resend",
        };

        let from = message
            .from
            .as_deref()
            .or(secrets.from_email.as_deref())
            .or(self.defaults.default_from_email.as_deref())
            .ok_or_else(|| {
                trellis_core::Error::configuration()
                    .with_message("Email configuration is missing from_email")
            })?;

        let subject = message
            .subject
            .as_deref()
            .unwrap_or(&self.defaults.default_subject);
        let html = message.html.as_deref().unwrap_or(&message.body);

        let email = EmailMessage {
            to: &message.to,
            subject,
            html,
            text: Some(&message.body),
            from,
            reply_to: secrets.reply_to.as_deref(),
        };

        let receipt = self.email.send(&secrets, &email).await?;
        Ok((label.to_string(), receipt))
    }

    /// Reports a delivery outcome that reached the provider to the health
    /// manager.
    ///
    /// Even when the invoking request was abandoned, the outcome still lands
    /// here before the future resolves, so a successfully sent message is
    /// never lost from status bookkeeping.
    async fn report_outcome(&self, tenant: Uuid, channel: Channel, receipt: &DeliveryReceipt) {
        let (status, error) = if receipt.success {
            (ConnectionStatus::Connected, None)
        } else {
            (ConnectionStatus::Error, receipt.error.clone())
        };

        if let Err(update_error) = self
            .health
            .update(tenant, channel.provider(), status, error, None)
            .await
        {
            tracing::error!(
                target: TRACING_TARGET,
                channel = %channel,
                error = %update_error,
                "Failed to record delivery outcome"
            );
        }
    }
}
