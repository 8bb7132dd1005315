//! vigil-kg — the deterministic tool library the reasoning loop drives.
//!
//! Every tool is a read-only query over the knowledge graph returning
//! structured data (never prose), and fails with an enumerated `ToolError`.
//! Each returned record carries the claim keys a caller needs to drill into
//! provenance via the evidence tools.

pub mod adverse_events;
pub mod error;
pub mod evidence;
pub mod mechanism;
pub mod paths;
pub mod resolve;
pub mod scoring;
pub mod subgraph;

pub use error::ToolError;
pub use scoring::ScoringPolicy;
