//! vigil-graph — read-only gateway to the knowledge-graph store.
//!
//! The `GraphStore` trait exposes one method per fixed parameterised query the
//! tool library needs; `PgGraphStore` backs it with Postgres, `MemoryGraph`
//! backs it with an in-process fixture for test harnesses. No write operation
//! exists anywhere in this crate.

pub mod error;
pub mod memory;
pub mod pg;
pub mod rows;
pub mod store;

pub use error::GraphError;
pub use memory::MemoryGraph;
pub use pg::PgGraphStore;
pub use store::{EntityKind, GraphStore};
