//! Database models for the integration gateway.
//!
//! This module contains Diesel model definitions for all database tables,
//! including structs for querying, inserting, and updating records.

mod integration_connection;

pub use integration_connection::{
    IntegrationConnection, NewIntegrationConnection, UpdateIntegrationConnection,
};
