//! Database enumeration types for type-safe queries.
//!
//! This module provides strongly-typed enumerations that correspond to PostgreSQL ENUM types
//! defined in the database schema. Each enumeration provides serialization support for APIs
//! and database integration through Diesel.

pub mod connection_status;
pub mod integration_provider;

pub use connection_status::ConnectionStatus;
pub use integration_provider::IntegrationProvider;
