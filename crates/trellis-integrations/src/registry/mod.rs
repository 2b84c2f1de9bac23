//! Static catalog of integration definitions.
//!
//! The registry describes, per provider, the configuration schema a tenant
//! fills in: field list, types, required flags, and inter-field dependencies.
//! It drives generic configuration UI and validation. The registry is pure
//! lookup, with no I/O and no mutable state after process start; the
//! `depends_on` relation is advisory metadata for rendering, never enforced
//! here.

mod catalog;
mod definition;

pub use catalog::{all, by_category, describe};
pub use definition::{
    ConfigField, FieldType, IntegrationCategory, IntegrationDefinition, SelectOption,
};

#[cfg(test)]
mod tests {
    use trellis_postgres::types::IntegrationProvider;

    use super::*;

    #[test]
    fn test_describe_covers_every_provider() {
        for provider in [
            IntegrationProvider::Email,
            IntegrationProvider::VoipmsSms,
            IntegrationProvider::Whatsapp,
            IntegrationProvider::Quickbooks,
            IntegrationProvider::Sola,
        ] {
            let definition = describe(provider);
            assert_eq!(definition.provider, provider);
            assert!(!definition.name.is_empty());
        }
    }

    #[test]
    fn test_all_matches_describe() {
        let all_definitions = all();
        assert_eq!(all_definitions.len(), 5);
        for definition in all_definitions {
            assert_eq!(describe(definition.provider).provider, definition.provider);
        }
    }

    #[test]
    fn test_by_category_is_consistent() {
        let communication = by_category(IntegrationCategory::Communication);
        assert!(
            communication
                .iter()
                .all(|d| d.category == IntegrationCategory::Communication)
        );
        assert!(
            communication
                .iter()
                .any(|d| d.provider == IntegrationProvider::VoipmsSms)
        );

        let accounting = by_category(IntegrationCategory::Accounting);
        assert_eq!(accounting.len(), 1);
        assert_eq!(accounting[0].provider, IntegrationProvider::Quickbooks);

        let payment = by_category(IntegrationCategory::Payment);
        assert_eq!(payment.len(), 1);
        assert_eq!(payment[0].provider, IntegrationProvider::Sola);
    }

    #[test]
    fn test_email_sub_provider_fields_depend_on_provider() {
        let email = describe(IntegrationProvider::Email);
        let domain = email.field("mailgun_domain").unwrap();
        assert_eq!(domain.depends_on, Some("provider"));
        assert!(!domain.required);
    }

    #[test]
    fn test_voipms_webhook_field_is_secret_typed() {
        let voipms = describe(IntegrationProvider::VoipmsSms);
        let field = voipms.field("webhook_secret").unwrap();
        assert_eq!(field.field_type, FieldType::Secret);
        assert!(!field.required);
    }

    #[test]
    fn test_validate_required_reports_missing_keys() {
        use crate::SecretBundle;

        let voipms = describe(IntegrationProvider::VoipmsSms);

        let mut bundle = SecretBundle::new();
        bundle.insert("username", "tenant_user");

        let error = voipms.validate_required(&bundle).unwrap_err();
        let message = error.message.unwrap_or_default();
        assert!(message.contains("api_password"));
        assert!(message.contains("default_did"));
        assert!(!message.contains("username"));
    }

    #[test]
    fn test_validate_required_accepts_complete_bundle() {
        use crate::SecretBundle;

        let voipms = describe(IntegrationProvider::VoipmsSms);

        let mut bundle = SecretBundle::new();
        bundle.insert("username", "tenant_user");
        bundle.insert("api_password", "api-pass");
        bundle.insert("default_did", "5551234567");

        assert!(voipms.validate_required(&bundle).is_ok());
    }
}
