#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for routing operations.
pub const TRACING_TARGET: &str = "trellis_messaging::router";

mod channel;
mod defaults;
mod message;
mod router;

pub use channel::Channel;
pub use defaults::MessagingDefaults;
pub use message::{DeliveryResult, OutboundMessage};
pub use router::MessageRouter;
