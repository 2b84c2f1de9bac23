//! The process-wide integration catalog.

use trellis_postgres::types::IntegrationProvider;

use super::definition::{
    ConfigField, FieldType, IntegrationCategory, IntegrationDefinition, SelectOption,
};

const EMAIL_PROVIDER_OPTIONS: &[SelectOption] = &[
    SelectOption {
        label: "SendGrid",
        value: "sendgrid",
    },
    SelectOption {
        label: "Mailgun",
        value: "mailgun",
    },
    SelectOption {
        label: "Resend",
        value: "resend",
    },
];

const MAILGUN_REGION_OPTIONS: &[SelectOption] = &[
    SelectOption {
        label: "US",
        value: "us",
    },
    SelectOption {
        label: "EU",
        value: "eu",
    },
];

const WHATSAPP_PROVIDER_OPTIONS: &[SelectOption] = &[
    SelectOption {
        label: "Twilio WhatsApp",
        value: "twilio",
    },
    SelectOption {
        label: "Meta WhatsApp Cloud API",
        value: "meta",
    },
];

const SOLA_MODE_OPTIONS: &[SelectOption] = &[
    SelectOption {
        label: "Sandbox",
        value: "sandbox",
    },
    SelectOption {
        label: "Production",
        value: "production",
    },
];

const EMAIL_FIELDS: &[ConfigField] = &[
    ConfigField::required("provider", "Provider", FieldType::Select)
        .with_options(EMAIL_PROVIDER_OPTIONS),
    ConfigField::required("api_key", "API Key", FieldType::Password)
        .with_placeholder("Enter your API key"),
    ConfigField::required("from_email", "From Email", FieldType::Email)
        .with_placeholder("noreply@example.com"),
    ConfigField::optional("reply_to", "Reply-To Email", FieldType::Email)
        .with_placeholder("support@example.com"),
    ConfigField::optional("mailgun_domain", "Mailgun Domain", FieldType::Text)
        .with_placeholder("mg.example.com")
        .depends_on("provider"),
    ConfigField::optional("mailgun_region", "Mailgun Region", FieldType::Select)
        .with_options(MAILGUN_REGION_OPTIONS)
        .depends_on("provider"),
];

const VOIPMS_FIELDS: &[ConfigField] = &[
    ConfigField::required("username", "VoIP.ms Username", FieldType::Text)
        .with_placeholder("your_username"),
    ConfigField::required("api_password", "VoIP.ms API Password", FieldType::Password)
        .with_placeholder("Your API password (NOT your login password)"),
    ConfigField::required("default_did", "Default Outbound SMS DID", FieldType::Text)
        .with_placeholder("+15551234567"),
    ConfigField::optional("webhook_secret", "Webhook URL (Auto-generated)", FieldType::Secret)
        .with_placeholder("Auto-generated"),
];

const WHATSAPP_FIELDS: &[ConfigField] = &[
    ConfigField::required("provider", "Provider", FieldType::Select)
        .with_options(WHATSAPP_PROVIDER_OPTIONS),
    // Twilio fields
    ConfigField::optional("twilio_account_sid", "Twilio Account SID", FieldType::Text)
        .with_placeholder("AC...")
        .depends_on("provider"),
    ConfigField::optional("twilio_auth_token", "Twilio Auth Token", FieldType::Password)
        .with_placeholder("Your auth token")
        .depends_on("provider"),
    ConfigField::optional("twilio_from_number", "WhatsApp From Number", FieldType::Text)
        .with_placeholder("whatsapp:+14155238886")
        .depends_on("provider"),
    ConfigField::optional(
        "twilio_messaging_service_sid",
        "Messaging Service SID (Optional)",
        FieldType::Text,
    )
    .with_placeholder("MG...")
    .depends_on("provider"),
    // Meta fields
    ConfigField::optional("meta_phone_number_id", "Phone Number ID", FieldType::Text)
        .with_placeholder("123456789")
        .depends_on("provider"),
    ConfigField::optional("meta_access_token", "Permanent Access Token", FieldType::Password)
        .with_placeholder("Your access token")
        .depends_on("provider"),
    ConfigField::optional("meta_app_secret", "App Secret (Optional)", FieldType::Password)
        .with_placeholder("Your app secret")
        .depends_on("provider"),
    ConfigField::optional("meta_verify_token", "Verify Token (for webhooks)", FieldType::Secret)
        .with_placeholder("Auto-generated")
        .depends_on("provider"),
];

const SOLA_FIELDS: &[ConfigField] = &[
    ConfigField::required("mode", "Mode", FieldType::Select).with_options(SOLA_MODE_OPTIONS),
    ConfigField::required("secret_key", "Secret Key", FieldType::Password)
        .with_placeholder("Your secret key"),
    ConfigField::optional("webhook_secret", "Webhook Signing Secret", FieldType::Secret)
        .with_placeholder("Auto-generated"),
    ConfigField::optional("merchant_id", "Merchant/Account ID (Optional)", FieldType::Text)
        .with_placeholder("Your merchant ID"),
];

const CATALOG: &[IntegrationDefinition] = &[
    IntegrationDefinition {
        provider: IntegrationProvider::Email,
        name: "Email Provider",
        description: "Send emails via SendGrid, Mailgun, or Resend",
        category: IntegrationCategory::Communication,
        requires_oauth: false,
        requires_webhook: false,
        config_fields: EMAIL_FIELDS,
    },
    IntegrationDefinition {
        provider: IntegrationProvider::VoipmsSms,
        name: "VoIP.ms SMS & MMS",
        description: "Send and receive SMS and MMS messages via VoIP.ms",
        category: IntegrationCategory::Communication,
        requires_oauth: false,
        requires_webhook: true,
        config_fields: VOIPMS_FIELDS,
    },
    IntegrationDefinition {
        provider: IntegrationProvider::Whatsapp,
        name: "WhatsApp",
        description: "Send WhatsApp messages via Twilio or Meta Cloud API",
        category: IntegrationCategory::Communication,
        requires_oauth: false,
        requires_webhook: true,
        config_fields: WHATSAPP_FIELDS,
    },
    IntegrationDefinition {
        provider: IntegrationProvider::Quickbooks,
        name: "QuickBooks Online",
        description: "Sync invoices, payments, and customers with QuickBooks",
        category: IntegrationCategory::Accounting,
        requires_oauth: true,
        requires_webhook: false,
        config_fields: &[],
    },
    IntegrationDefinition {
        provider: IntegrationProvider::Sola,
        name: "Sola Payments",
        description: "Process payments and receive webhooks from Sola",
        category: IntegrationCategory::Payment,
        requires_oauth: false,
        requires_webhook: true,
        config_fields: SOLA_FIELDS,
    },
];

/// Returns the definition for a provider.
pub fn describe(provider: IntegrationProvider) -> &'static IntegrationDefinition {
    CATALOG
        .iter()
        .find(|definition| definition.provider == provider)
        .expect("catalog covers every provider variant")
}

/// Returns every integration definition.
pub fn all() -> &'static [IntegrationDefinition] {
    CATALOG
}

/// Returns the definitions in a category, in catalog order.
pub fn by_category(category: IntegrationCategory) -> Vec<&'static IntegrationDefinition> {
    CATALOG
        .iter()
        .filter(|definition| definition.category == category)
        .collect()
}
