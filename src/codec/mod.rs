//! Text encodings stored inside gateway records.
//!
//! # Data Flow
//! ```text
//! raw gateway field (string)
//!     → prefix.rs  (comma-separated prefix lists)
//!     → rewrite.rs (virtual key → real numbers)
//!     → typed view on MappingGateway / RoutingGateway
//!
//! GatewayPatch override
//!     → format back to the stored string
//! ```

pub mod prefix;
pub mod rewrite;

pub use rewrite::{RewriteRuleSet, SENTINEL};
