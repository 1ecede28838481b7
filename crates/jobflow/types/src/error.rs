//! Error types for jobflow-types

use thiserror::Error;

/// Errors produced while parsing resource identities and selectors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Object key is not of the form `namespace/name` or `name`
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    /// Label selector requirement could not be parsed
    #[error("invalid label selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Manifest could not be read or decoded
    #[error("invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },
}

/// Result type alias for schema operations
pub type TypesResult<T> = Result<T, TypesError>;
