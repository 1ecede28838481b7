//! CLI error types

use thiserror::Error;

/// Errors surfaced to the terminal
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid combination of arguments
    #[error("{0}")]
    Usage(String),

    /// Resource not found on the daemon
    #[error("Not found: {0}")]
    NotFound(String),

    /// Daemon returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure talking to the daemon
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Manifest could not be read or parsed
    #[error("{0}")]
    Manifest(#[from] jobflow_types::TypesError),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type CliResult<T> = Result<T, CliError>;
