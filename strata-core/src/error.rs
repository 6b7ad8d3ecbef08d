//! Structured error types for the Strata crates.

use thiserror::Error;

/// Unified error type for all Strata operations.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Invalid input (bad arguments, empty sequences, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two collaborators disagree on a dimension (observation vs. distribution)
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Floating-point breakdown (zero likelihood, underflow)
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Strata crates.
pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = StrataError::InvalidInput("nb_states must be > 0".into());
        assert_eq!(e.to_string(), "invalid input: nb_states must be > 0");

        let e = StrataError::DimensionMismatch {
            expected: 3,
            found: 2,
        };
        assert_eq!(e.to_string(), "dimension mismatch: expected 3, found 2");
    }
}
