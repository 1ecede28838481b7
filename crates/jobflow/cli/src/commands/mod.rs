//! CLI command implementations

pub mod apply;
pub mod delete;
pub mod get;

use crate::client::JobflowClient;
use crate::output::OutputFormat;
use jobflow_types::{ObjectKey, DEFAULT_NAMESPACE};

/// Resource kinds addressable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResourceKind {
    #[value(alias = "workflows", alias = "wf")]
    Workflow,
    #[value(alias = "jobs")]
    Job,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Workflow => "workflow",
            ResourceKind::Job => "job",
        }
    }
}

/// State shared by every command
pub struct Context {
    pub client: JobflowClient,
    pub output: OutputFormat,
    pub namespace: Option<String>,
}

impl Context {
    /// Namespace for single-object and bulk operations
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn key(&self, name: &str) -> ObjectKey {
        ObjectKey::new(self.namespace(), name)
    }
}
