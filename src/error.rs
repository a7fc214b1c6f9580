//! Error types for Asediar operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for Asediar operations.
///
/// Covers dimension mismatches, degenerate graph structure, model lifecycle
/// misuse, and invalid hyperparameters.
///
/// # Examples
///
/// ```
/// use asediar::error::AsediarError;
///
/// let err = AsediarError::NotFitted {
///     what: "GcnModel".to_string(),
/// };
/// assert!(err.to_string().contains("not fitted"));
/// ```
#[derive(Debug)]
pub enum AsediarError {
    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A node has zero degree, making spectral normalization undefined.
    DegenerateDegree {
        /// Index of the zero-degree node
        node: usize,
    },

    /// Model was queried before `fit` was called.
    NotFitted {
        /// Name of the component that is not fitted
        what: String,
    },

    /// Network construction found no trainable weight matrices.
    NoTrainableParameters,

    /// Requested operation is declared out of scope for this version.
    Unsupported {
        /// Name of the unsupported operation
        operation: String,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for AsediarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsediarError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            AsediarError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            AsediarError::DegenerateDegree { node } => {
                write!(
                    f,
                    "Degenerate degree: node {node} has zero row sum, normalization undefined"
                )
            }
            AsediarError::NotFitted { what } => {
                write!(f, "{what} is not fitted: call fit() first")
            }
            AsediarError::NoTrainableParameters => {
                write!(f, "No trainable parameters found at network construction")
            }
            AsediarError::Unsupported { operation } => {
                write!(f, "Unsupported operation: {operation}")
            }
            AsediarError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AsediarError {}

impl From<&str> for AsediarError {
    fn from(msg: &str) -> Self {
        AsediarError::Other(msg.to_string())
    }
}

impl From<String> for AsediarError {
    fn from(msg: String) -> Self {
        AsediarError::Other(msg)
    }
}

impl AsediarError {
    /// Create an index out of bounds error
    #[must_use]
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Self::Other(format!("index {index} out of bounds (len={len})"))
    }

    /// Create a not-fitted error for a named component
    #[must_use]
    pub fn not_fitted(what: &str) -> Self {
        Self::NotFitted {
            what: what.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, AsediarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = AsediarError::DimensionMismatch {
            expected: "6x6".to_string(),
            actual: "6x4".to_string(),
        };
        assert!(err.to_string().contains("dimension mismatch"));
        assert!(err.to_string().contains("6x6"));
        assert!(err.to_string().contains("6x4"));
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = AsediarError::InvalidHyperparameter {
            param: "sigma2".to_string(),
            value: "0".to_string(),
            constraint: ">0".to_string(),
        };
        assert!(err.to_string().contains("Invalid hyperparameter"));
        assert!(err.to_string().contains("sigma2"));
    }

    #[test]
    fn test_degenerate_degree_display() {
        let err = AsediarError::DegenerateDegree { node: 3 };
        let msg = err.to_string();
        assert!(msg.contains("node 3"));
        assert!(msg.contains("zero row sum"));
    }

    #[test]
    fn test_not_fitted_display() {
        let err = AsediarError::not_fitted("EnsembleGcn");
        assert!(err.to_string().contains("EnsembleGcn is not fitted"));
    }

    #[test]
    fn test_unsupported_display() {
        let err = AsediarError::Unsupported {
            operation: "modify_structure".to_string(),
        };
        assert!(err.to_string().contains("Unsupported"));
        assert!(err.to_string().contains("modify_structure"));
    }

    #[test]
    fn test_from_str() {
        let err: AsediarError = "test error".into();
        assert!(matches!(err, AsediarError::Other(_)));
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_index_out_of_bounds_helper() {
        let err = AsediarError::index_out_of_bounds(10, 5);
        let msg = err.to_string();
        assert!(msg.contains("index 10"));
        assert!(msg.contains("len=5"));
    }
}
