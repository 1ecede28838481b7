//! Get command

use super::{Context, ResourceKind};
use crate::error::CliResult;
use crate::output::{self, humanize_duration};
use chrono::Utc;
use clap::Args;
use jobflow_types::{
    ConditionStatus, Job, ObjectMeta, Workflow, WorkflowConditionType, STEP_ANNOTATION,
};
use serde::Serialize;
use tabled::Tabled;

/// Show workflows or jobs
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Resource kind
    pub kind: ResourceKind,

    /// Resource name; lists when omitted
    pub name: Option<String>,

    /// Label selector, e.g. `team=data,tier=batch`
    #[arg(short = 'l', long, conflicts_with = "name")]
    pub selector: Option<String>,
}

/// Table row for workflow display
#[derive(Debug, Serialize, Tabled)]
struct WorkflowRow {
    namespace: String,
    name: String,
    steps: usize,
    jobs: usize,
    status: String,
    age: String,
}

impl From<&Workflow> for WorkflowRow {
    fn from(w: &Workflow) -> Self {
        Self {
            namespace: w.metadata.namespace.clone(),
            name: w.metadata.name.clone(),
            steps: w.spec.steps.len(),
            jobs: w.status.statuses.as_ref().map_or(0, |s| s.len()),
            status: workflow_status(w),
            age: age(&w.metadata),
        }
    }
}

/// Table row for job display
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    namespace: String,
    name: String,
    workflow: String,
    step: String,
    status: String,
    age: String,
}

impl From<&Job> for JobRow {
    fn from(j: &Job) -> Self {
        Self {
            namespace: j.metadata.namespace.clone(),
            name: j.metadata.name.clone(),
            workflow: j
                .metadata
                .controller_ref()
                .map_or_else(|| "-".to_string(), |r| r.name.clone()),
            step: j
                .metadata
                .annotations
                .get(STEP_ANNOTATION)
                .cloned()
                .unwrap_or_else(|| "-".to_string()),
            status: job_status(j),
            age: age(&j.metadata),
        }
    }
}

fn workflow_status(w: &Workflow) -> String {
    let finished = w
        .status
        .conditions
        .iter()
        .find(|c| c.status == ConditionStatus::True);
    match finished.map(|c| &c.condition_type) {
        Some(WorkflowConditionType::Complete) => "Complete".to_string(),
        Some(WorkflowConditionType::Failed) => "Failed".to_string(),
        Some(WorkflowConditionType::Other(kind)) => kind.clone(),
        None if w.status.statuses.is_some() => "Running".to_string(),
        None => "Pending".to_string(),
    }
}

fn job_status(j: &Job) -> String {
    if j.is_failed() {
        "Failed".to_string()
    } else if j.is_complete() {
        "Complete".to_string()
    } else if j.status.active > 0 {
        "Active".to_string()
    } else {
        "Pending".to_string()
    }
}

fn age(meta: &ObjectMeta) -> String {
    meta.creation_timestamp
        .map(|t| humanize_duration(Utc::now() - t))
        .unwrap_or_else(|| "-".to_string())
}

pub async fn execute(args: GetArgs, ctx: &Context) -> CliResult<()> {
    let selector = args.selector.as_deref();
    match (args.kind, args.name) {
        (ResourceKind::Workflow, Some(name)) => {
            let workflow: Workflow = ctx.client.get(&ctx.key(&name)).await?;
            output::print_resources(&[workflow], ctx.output, |w| WorkflowRow::from(w))
        }
        (ResourceKind::Workflow, None) => {
            let workflows: Vec<Workflow> =
                ctx.client.list(ctx.namespace.as_deref(), selector).await?;
            output::print_resources(&workflows, ctx.output, |w| WorkflowRow::from(w))
        }
        (ResourceKind::Job, Some(name)) => {
            let job: Job = ctx.client.get(&ctx.key(&name)).await?;
            output::print_resources(&[job], ctx.output, |j| JobRow::from(j))
        }
        (ResourceKind::Job, None) => {
            let jobs: Vec<Job> = ctx.client.list(ctx.namespace.as_deref(), selector).await?;
            output::print_resources(&jobs, ctx.output, |j| JobRow::from(j))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobflow_types::{
        JobCondition, JobConditionType, ObjectReference, OwnerReference, WorkflowCondition,
        WorkflowSpec,
    };
    use std::collections::BTreeMap;

    #[test]
    fn test_workflow_status_progression() {
        let mut workflow = Workflow::new(ObjectMeta::named("default", "mydag"), WorkflowSpec::default());
        assert_eq!(workflow_status(&workflow), "Pending");

        let mut statuses = BTreeMap::new();
        statuses.insert(
            "myJob".to_string(),
            ObjectReference {
                kind: "Job".to_string(),
                namespace: "default".to_string(),
                name: "mydag-myjob-abc12".to_string(),
                uid: None,
            },
        );
        workflow.status.statuses = Some(statuses);
        assert_eq!(workflow_status(&workflow), "Running");

        workflow.status.conditions.push(WorkflowCondition::new(
            WorkflowConditionType::Failed,
            ConditionStatus::True,
        ));
        assert_eq!(workflow_status(&workflow), "Failed");

        let row = WorkflowRow::from(&workflow);
        assert_eq!(row.jobs, 1);
        assert_eq!(row.age, "-");
    }

    #[test]
    fn test_job_row_shows_owner_and_step() {
        let mut meta = ObjectMeta::named("default", "mydag-myjob-abc12");
        meta.owner_references.push(OwnerReference {
            kind: "Workflow".to_string(),
            name: "mydag".to_string(),
            uid: None,
            controller: true,
        });
        meta.annotations
            .insert(STEP_ANNOTATION.to_string(), "myJob".to_string());
        let mut job = Job {
            metadata: meta,
            spec: Default::default(),
            status: Default::default(),
        };
        job.status.active = 1;

        let row = JobRow::from(&job);
        assert_eq!(row.workflow, "mydag");
        assert_eq!(row.step, "myJob");
        assert_eq!(row.status, "Active");

        job.status.conditions.push(JobCondition::new(
            JobConditionType::Complete,
            ConditionStatus::True,
        ));
        assert_eq!(job_status(&job), "Complete");
    }
}
