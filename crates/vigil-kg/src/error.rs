use thiserror::Error;

use vigil_graph::GraphError;

/// Enumerated tool failure. Nothing else may escape a tool function: invalid
/// inputs are rejected before any store access, store faults are reported as
/// `Upstream`, and the dispatcher's watchdog produces `Timeout`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool arguments: {0}")]
    InvalidArgs(String),

    #[error("graph query failed: {0}")]
    Upstream(#[from] GraphError),

    #[error("tool timed out after {0}s")]
    Timeout(u64),
}

impl ToolError {
    /// Stable category string used in logs and in the observer's view.
    pub fn category(&self) -> &'static str {
        match self {
            ToolError::InvalidArgs(_) => "tool.invalid_args",
            ToolError::Upstream(_) => "tool.upstream",
            ToolError::Timeout(_) => "tool.timeout",
        }
    }
}

/// Reject a fraction that falls outside [0, 1] before any store access.
pub(crate) fn check_unit_range(name: &str, value: f64) -> Result<(), ToolError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ToolError::InvalidArgs(format!("{name} must be in [0,1], got {value}")))
    }
}

/// Reject a non-positive limit before any store access.
pub(crate) fn check_positive(name: &str, value: i64) -> Result<(), ToolError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ToolError::InvalidArgs(format!("{name} must be >= 1, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(ToolError::InvalidArgs("x".into()).category(), "tool.invalid_args");
        assert_eq!(ToolError::Timeout(30).category(), "tool.timeout");
    }

    #[test]
    fn test_range_checks() {
        assert!(check_unit_range("min_score", 0.5).is_ok());
        assert!(check_unit_range("min_score", -0.1).is_err());
        assert!(check_unit_range("min_score", 1.2).is_err());
        assert!(check_positive("limit", 1).is_ok());
        assert!(check_positive("limit", 0).is_err());
    }
}
