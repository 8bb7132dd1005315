use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("graph schema mismatch: missing {0}")]
    SchemaMismatch(String),
}

impl GraphError {
    /// Stable category string used in logs and error surfaces.
    pub fn category(&self) -> &'static str {
        match self {
            GraphError::Unavailable(_) => "graph.unavailable",
            GraphError::SchemaMismatch(_) => "graph.schema_mismatch",
        }
    }
}
