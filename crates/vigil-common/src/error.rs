use thiserror::Error;

/// Errors raised by the shared configuration layer. Subsystems carry their
/// own enumerated errors (`GraphError`, `ToolError`, `LlmError`); this type
/// only covers what the common crate itself produces.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VigilError>;
