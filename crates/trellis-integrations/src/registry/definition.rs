//! Integration definition and configuration field descriptors.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};
use trellis_core::Error;
use trellis_postgres::types::IntegrationProvider;

use crate::SecretBundle;

/// Product category an integration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntegrationCategory {
    /// Outbound messaging: SMS, MMS, WhatsApp, email
    Communication,
    /// Bookkeeping and invoicing sync
    Accounting,
    /// Payment processing
    Payment,
}

/// Rendered input type of a configuration field.
///
/// `Password` fields are masked whenever stored values are displayed.
/// `Secret` fields are the one exemption: webhook secrets the operator must
/// copy verbatim into a third-party dashboard are shown in full and treated
/// as read-only/regenerate-only by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldType {
    Text,
    Password,
    Email,
    Url,
    Number,
    Select,
    Secret,
    TextArea,
}

/// One option of a `Select` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    /// Human-readable label.
    pub label: &'static str,
    /// Stored value.
    pub value: &'static str,
}

/// Descriptor of a single configuration field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConfigField {
    /// Bundle key the field maps to.
    pub key: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Rendered input type.
    pub field_type: FieldType,
    /// Whether the field must be present for the integration to save.
    pub required: bool,
    /// Example value shown in empty inputs.
    pub placeholder: Option<&'static str>,
    /// Allowed values for `Select` fields.
    pub options: &'static [SelectOption],
    /// Key of another field this one is conditionally shown for.
    /// Advisory only; the caller's rendering logic interprets it.
    pub depends_on: Option<&'static str>,
}

impl ConfigField {
    /// Creates a required field of the given type.
    pub const fn required(key: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            key,
            label,
            field_type,
            required: true,
            placeholder: None,
            options: &[],
            depends_on: None,
        }
    }

    /// Creates an optional field of the given type.
    pub const fn optional(key: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            key,
            label,
            field_type,
            required: false,
            placeholder: None,
            options: &[],
            depends_on: None,
        }
    }

    /// Sets the placeholder text.
    pub const fn with_placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    /// Sets the allowed values for a `Select` field.
    pub const fn with_options(mut self, options: &'static [SelectOption]) -> Self {
        self.options = options;
        self
    }

    /// Marks the field as conditionally visible based on another field.
    pub const fn depends_on(mut self, key: &'static str) -> Self {
        self.depends_on = Some(key);
        self
    }
}

/// Immutable description of one integration: identity, display metadata, and
/// the ordered configuration schema. Carries no secret data itself.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntegrationDefinition {
    /// Provider this definition describes.
    pub provider: IntegrationProvider,
    /// Display name.
    pub name: &'static str,
    /// Short description for catalog listings.
    pub description: &'static str,
    /// Product category.
    pub category: IntegrationCategory,
    /// Whether connecting runs an OAuth browser flow (handled elsewhere).
    pub requires_oauth: bool,
    /// Whether the provider delivers inbound events via webhook.
    pub requires_webhook: bool,
    /// Ordered configuration field descriptors.
    pub config_fields: &'static [ConfigField],
}

impl IntegrationDefinition {
    /// Looks up a field descriptor by bundle key.
    pub fn field(&self, key: &str) -> Option<&ConfigField> {
        self.config_fields.iter().find(|field| field.key == key)
    }

    /// Returns the field type for a bundle key, if the key is described.
    pub fn field_type(&self, key: &str) -> Option<FieldType> {
        self.field(key).map(|field| field.field_type)
    }

    /// Checks that every required field is present and non-empty in the
    /// bundle.
    ///
    /// Returns a configuration error naming the missing keys. This check
    /// never performs I/O; adapters do their own stricter, sub-provider-aware
    /// validation when converting the bundle to typed secrets.
    pub fn validate_required(&self, bundle: &SecretBundle) -> Result<(), Error> {
        let missing: Vec<&str> = self
            .config_fields
            .iter()
            .filter(|field| field.required)
            .filter(|field| bundle.get_str(field.key).is_none())
            .map(|field| field.key)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(Error::configuration().with_message(format!(
            "{} configuration is missing required fields: {}",
            self.name,
            missing.join(", ")
        )))
    }
}
