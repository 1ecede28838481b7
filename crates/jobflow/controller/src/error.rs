//! Error types for jobflow-controller
//!
//! Every error here is scoped to a single reconcile pass. None of them is
//! allowed to stop the controller; the worker logs them and moves on.

use jobflow_types::ObjectKey;
use thiserror::Error;

/// Local object store failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The cache could not serve the read
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the job-control boundary
#[derive(Debug, Clone, Error)]
pub enum JobControlError {
    /// A job with the generated name already exists
    #[error("job {0} already exists")]
    AlreadyExists(ObjectKey),

    /// The platform rejected the create call
    #[error("job creation rejected for {workflow} step {step}: {reason}")]
    Rejected {
        workflow: ObjectKey,
        step: String,
        reason: String,
    },
}

/// Failure writing workflow status back to the platform
#[derive(Debug, Clone, Error)]
pub enum StatusWriteError {
    /// Workflow disappeared between read and write
    #[error("workflow {0} not found")]
    NotFound(ObjectKey),

    /// Write lost against a newer version
    #[error("conflict writing status for {key}: stored version {stored}, written {written}")]
    Conflict {
        key: ObjectKey,
        stored: u64,
        written: u64,
    },

    #[error("status write failed: {0}")]
    Backend(String),
}

/// Errors surfaced by a reconcile pass
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("job control error: {0}")]
    JobControl(#[from] JobControlError),

    #[error("status write error: {0}")]
    StatusWrite(#[from] StatusWriteError),

    /// One or more steps failed to materialize; the pass still completed
    #[error("{failed} of {attempted} job creations failed for {workflow}")]
    PartialSync {
        workflow: ObjectKey,
        attempted: usize,
        failed: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;
