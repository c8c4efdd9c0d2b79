//! Number cleanup across the fleet.
//!
//! # Data Flow
//! ```text
//! numbers → VariantGenerator → VariantIndex
//!     → matcher.rs: MG scan ∥ RG scan (separate fan-outs) → CleanupCandidate plan
//!     → operator reviews, edits payloads
//!     → apply.rs: CleanupTask list → Modify* per task → TaskReport per task
//!
//! numbers → search.rs → Occurrence report (read-only, no filters)
//! ```
//!
//! # Design Decisions
//! - Scanning never writes; applying is a separate, explicit step
//! - Matching uses only the expanded variant set
//! - Callee prefixes are only cleaned on outbound-named routing gateways
//! - Rewrite keys are only cleaned when shaped like a six-digit virtual number

pub mod apply;
pub mod matcher;
pub mod search;

pub use apply::{CleanupApplier, CleanupTask, TaskReport};
pub use matcher::{
    is_outbound_name, is_six_digit_virtual_candidate, CleanupCandidate, CleanupMatcher,
    MappingCandidate, RoutingCandidate,
};
pub use search::{MatchField, NumberSearch, Occurrence};
