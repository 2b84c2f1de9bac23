//! Database query repositories for the integration gateway.
//!
//! This module contains repository implementations that provide high-level
//! database operations, encapsulating common patterns and providing
//! type-safe interfaces.

pub mod integration_connection;

pub use integration_connection::IntegrationConnectionRepository;
