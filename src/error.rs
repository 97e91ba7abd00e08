//! Error types for the Veracity constraint engine.
//!
//! All fallible operations in the crate return [`Result`], built on the
//! single [`VeracityError`] enum. Per-constraint evaluation problems
//! (missing fields, inapplicable constraint kinds) are *not* errors: they
//! are reported as failures inside the verification report. Errors are
//! reserved for structural problems (malformed documents, unknown
//! columns, provider failures) which abort the whole operation.

use thiserror::Error;

/// The main error type for the Veracity library.
#[derive(Error, Debug)]
pub enum VeracityError {
    /// A constraint document could not be parsed or violates a document
    /// invariant (impossible bounds, incompatible constraint kinds,
    /// unparseable regular expressions). Fatal at load time.
    #[error("invalid constraint document: {0}")]
    InvalidDocument(String),

    /// A field named by the caller does not exist in the dataset.
    #[error("column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// A column's data does not have the type an operation requires.
    #[error("type mismatch for column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Error from DataFusion query execution.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow array operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations (document load/save).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialising or deserialising a document or report.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation was cancelled through its [`CancelToken`].
    ///
    /// [`CancelToken`]: crate::core::CancelToken
    #[error("operation cancelled")]
    Cancelled,

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, VeracityError>`, used throughout the crate.
pub type Result<T> = std::result::Result<T, VeracityError>;

impl VeracityError {
    /// Creates an invalid-document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Creates a column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Creates a type-mismatch error.
    pub fn type_mismatch(
        column: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for VeracityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_not_found_display() {
        let err = VeracityError::column_not_found("user_id");
        assert_eq!(err.to_string(), "column 'user_id' not found in dataset");
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = VeracityError::type_mismatch("age", "int", "string");
        assert_eq!(
            err.to_string(),
            "type mismatch for column 'age': expected int, found string"
        );
    }

    #[test]
    fn test_invalid_document_display() {
        let err = VeracityError::invalid_document("min 10 exceeds max 5 for field 'x'");
        assert!(err.to_string().starts_with("invalid constraint document"));
    }
}
