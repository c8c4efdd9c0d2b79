//! Routing-configuration management for a fleet of independent voice
//! servers.
//!
//! Each server owns its own gateways, rewrite rules and customers. This
//! crate reads them fleet-wide, plans cleanups and writes changes back one
//! server at a time, detecting (never preventing) concurrent edits.

// Leaf encodings and types
pub mod codec;
pub mod error;
pub mod model;

// Remote boundary and infrastructure
pub mod config;
pub mod conflict;
pub mod fanout;
pub mod observability;
pub mod transport;
pub mod variants;

// Operations
pub mod cleanup;
pub mod customer;
pub mod fleet;
pub mod repository;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use config::FleetConfig;
pub use error::{FleetError, FleetResult};
pub use fanout::{Gathered, ScatterGather, ServerFailure};
pub use fleet::Fleet;
