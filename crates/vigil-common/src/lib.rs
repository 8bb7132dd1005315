//! vigil-common — Shared configuration and errors used across all Vigil crates.

pub mod config;
pub mod error;

pub use config::{AgentConfig, Config, DatabaseConfig, LlmConfig, RoleConfig, ScoringConfig};
pub use error::{Result, VigilError};
