//! Boundary to the platform: creating jobs and writing workflow status

use crate::error::{JobControlError, StatusWriteError};
use async_trait::async_trait;
use chrono::Utc;
use jobflow_types::{
    Job, JobStatus, JobTemplateSpec, ObjectMeta, OwnerReference, Resource, Workflow,
    STEP_ANNOTATION, WORKFLOW_ANNOTATION,
};

/// Creates the job backing one workflow step
///
/// Callers may invoke this more than once for the same step; duplicates are
/// kept rare by the expectations cache, not prevented here.
#[async_trait]
pub trait JobControl: Send + Sync {
    async fn create_job(
        &self,
        namespace: &str,
        template: &JobTemplateSpec,
        workflow: &Workflow,
        step_name: &str,
    ) -> Result<(), JobControlError>;
}

/// Persists a workflow's status subresource
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow, StatusWriteError>;
}

const MAX_NAME_LEN: usize = 63;
const SUFFIX_LEN: usize = 5;

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// `<workflow>-<step>-<suffix>`, lowercased and trimmed to a DNS label
pub fn generate_job_name(workflow: &str, step: &str) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect();
    let mut prefix = format!("{}-{}", sanitize(workflow), sanitize(step));
    prefix.truncate(MAX_NAME_LEN - SUFFIX_LEN - 1);
    let prefix = prefix.trim_matches('-');
    format!("{}-{}", prefix, suffix)
}

/// Build the job a step template describes, owned by `workflow`
pub fn job_from_template(
    namespace: &str,
    template: &JobTemplateSpec,
    workflow: &Workflow,
    step_name: &str,
) -> Job {
    let mut annotations = template.metadata.annotations.clone();
    annotations.insert(WORKFLOW_ANNOTATION.to_string(), workflow.metadata.name.clone());
    annotations.insert(STEP_ANNOTATION.to_string(), step_name.to_string());

    let metadata = ObjectMeta {
        name: generate_job_name(&workflow.metadata.name, step_name),
        namespace: namespace.to_string(),
        uid: None,
        labels: template.metadata.labels.clone(),
        annotations,
        owner_references: vec![OwnerReference {
            kind: Workflow::KIND.to_string(),
            name: workflow.metadata.name.clone(),
            uid: workflow.metadata.uid.clone(),
            controller: true,
        }],
        creation_timestamp: Some(Utc::now()),
        resource_version: 0,
    };

    Job {
        metadata,
        spec: template.spec.clone(),
        status: JobStatus::default(),
    }
}

/// Step name recorded on a job created by [`job_from_template`]
pub fn job_step_name(job: &Job) -> Option<&str> {
    job.metadata.annotations.get(STEP_ANNOTATION).map(String::as_str)
}
