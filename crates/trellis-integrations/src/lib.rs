#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging.

/// Tracing target for connection store operations.
pub const TRACING_TARGET_STORE: &str = "trellis_integrations::store";

/// Tracing target for connection health operations.
pub const TRACING_TARGET_HEALTH: &str = "trellis_integrations::health";

/// Tracing target for provider adapter operations.
pub const TRACING_TARGET_PROVIDERS: &str = "trellis_integrations::providers";

mod http;
mod secrets;
mod store;

pub mod health;
pub mod providers;
pub mod registry;

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;

pub use trellis_core::{Error, ErrorKind, Result};
pub use trellis_postgres::types::{ConnectionStatus, IntegrationProvider};

pub use crate::health::{ConnectionView, HealthManager};
pub use crate::http::HttpConfig;
pub use crate::secrets::{
    SecretBundle, SecretCipher, SecretValue, masked_bundle, merge_for_save, webhook_secret_value,
};
pub use crate::store::{ConnectionBackend, ConnectionStore};
