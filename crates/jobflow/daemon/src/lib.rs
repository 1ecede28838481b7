//! Jobflow Daemon library
//!
//! This module provides the runtime around the workflow controller:
//! - Local cluster holding workflows and jobs
//! - REST API handlers
//! - Server lifecycle management

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod server;

pub use cluster::LocalCluster;
pub use config::DaemonConfig;
pub use error::{ApiError, ClusterError, DaemonError};
pub use server::{ControlPlane, Server};
