//! Jobflow resource schema
//!
//! The types in this crate are the persisted contract between the workflow
//! controller and the surrounding platform:
//!
//! - [`Workflow`]: a set of named steps, each carrying a job template, plus a
//!   status recording which job materialized each step
//! - [`Job`]: a unit of batch work created from a step template
//! - [`ObjectMeta`] / [`ObjectKey`]: identity and labels shared by every resource
//! - [`LabelSelector`]: the label match used to tie jobs back to workflows
//! - [`Manifest`]: JSON/YAML files holding resources tagged by `kind`
//!
//! Everything serializes with camelCase field names so manifests read the same
//! in JSON and YAML.

#![deny(unsafe_code)]

pub mod error;
pub mod job;
pub mod labels;
pub mod manifest;
pub mod meta;
pub mod workflow;

pub use error::{TypesError, TypesResult};
pub use job::*;
pub use labels::LabelSelector;
pub use manifest::{
    parse_manifests, read_manifest_dir, read_manifest_file, Manifest, ManifestFormat,
};
pub use meta::*;
pub use workflow::*;
