//! Workflow resource
//!
//! A workflow declares a set of named steps. Each step is materialized as
//! exactly one job; `status.statuses` records which job that was. Steps are a
//! flat fan-out: the step map carries no ordering or dependency edges.

use crate::job::JobTemplateSpec;
use crate::labels::LabelSelector;
use crate::meta::{ConditionStatus, ObjectMeta, ObjectReference, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation naming the workflow that created a job
pub const WORKFLOW_ANNOTATION: &str = "jobflow.io/workflow";

/// Annotation naming the workflow step a job materializes
pub const STEP_ANNOTATION: &str = "jobflow.io/step";

/// One step of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    #[serde(default)]
    pub job_template: JobTemplateSpec,
}

impl WorkflowStep {
    /// Selector derived from the template labels
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::from_labels(&self.job_template.metadata.labels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    #[serde(default)]
    pub steps: BTreeMap<String, WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowConditionType {
    Complete,
    Failed,
    /// A type set by someone else; stored and written back verbatim
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCondition {
    #[serde(rename = "type")]
    pub condition_type: WorkflowConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WorkflowCondition {
    pub fn new(condition_type: WorkflowConditionType, status: ConditionStatus) -> Self {
        Self {
            condition_type,
            status,
            last_probe_time: None,
            last_transition_time: None,
            reason: None,
            message: None,
        }
    }

    /// A `True` condition stamped with the current time
    pub fn now_true(
        condition_type: WorkflowConditionType,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            condition_type,
            status: ConditionStatus::True,
            last_probe_time: Some(now),
            last_transition_time: Some(now),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<WorkflowCondition>,

    /// Job reference per materialized step; `None` until the first reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<BTreeMap<String, ObjectReference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: WorkflowSpec,

    #[serde(default)]
    pub status: WorkflowStatus,
}

impl Workflow {
    pub fn new(metadata: ObjectMeta, spec: WorkflowSpec) -> Self {
        Self {
            metadata,
            spec,
            status: WorkflowStatus::default(),
        }
    }

    /// True once a `Complete` or `Failed` condition is `True`
    pub fn is_finished(&self) -> bool {
        is_workflow_finished(self)
    }

    /// Whether any step template selects a job carrying `labels`
    pub fn selects(&self, labels: &BTreeMap<String, String>) -> bool {
        self.spec
            .steps
            .values()
            .any(|step| step.selector().matches(labels))
    }

    /// Recorded job reference for `step`, if the step has been materialized
    pub fn step_status(&self, step: &str) -> Option<&ObjectReference> {
        self.status.statuses.as_ref().and_then(|s| s.get(step))
    }
}

impl Resource for Workflow {
    const KIND: &'static str = "Workflow";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

pub fn is_workflow_finished(workflow: &Workflow) -> bool {
    workflow.status.conditions.iter().any(|c| {
        matches!(
            c.condition_type,
            WorkflowConditionType::Complete | WorkflowConditionType::Failed
        ) && c.status == ConditionStatus::True
    })
}
