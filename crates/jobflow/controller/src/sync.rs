//! Reconcile pass for a single workflow key

use crate::controller::WorkflowController;
use crate::error::{ControllerError, ControllerResult};
use crate::events::{reasons, EventType};
use crate::job_control::job_step_name;
use crate::store::get_workflow_jobs;
use chrono::Utc;
use jobflow_types::{
    Job, ObjectKey, Resource, Workflow, WorkflowCondition, WorkflowConditionType, WorkflowStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

impl WorkflowController {
    /// Bring one workflow's jobs in line with its steps
    ///
    /// Safe to call any number of times for the same key; the queue keeps
    /// two passes for one key from overlapping.
    pub async fn sync_workflow(&self, key: &ObjectKey) -> ControllerResult<()> {
        let started = Instant::now();
        let result = self.sync_workflow_inner(key).await;
        tracing::debug!(
            workflow = %key,
            elapsed = ?started.elapsed(),
            ok = result.is_ok(),
            "Finished syncing workflow"
        );
        result
    }

    async fn sync_workflow_inner(&self, key: &ObjectKey) -> ControllerResult<()> {
        let workflow = match self.workflow_store.get_by_key(key) {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                tracing::debug!(workflow = %key, "Workflow has been deleted");
                self.expectations.delete_expectations(key);
                return Ok(());
            }
            Err(e) => {
                tracing::error!(workflow = %key, error = %e, "Unable to retrieve workflow from store");
                self.queue.add(key.clone());
                return Err(e.into());
            }
        };

        if !self.job_store.has_synced() {
            let delay = self.config.not_ready_requeue_delay();
            tracing::debug!(
                workflow = %key,
                delay = ?delay,
                "Waiting for job store to sync before syncing workflow"
            );
            tokio::time::sleep(delay).await;
            self.queue.add(key.clone());
            return Ok(());
        }

        if !self.expectations.satisfied_expectations(key) {
            tracing::debug!(workflow = %key, "Workflow doesn't need synced");
            return Ok(());
        }

        self.manage_workflow(workflow).await
    }

    async fn manage_workflow(&self, workflow: Workflow) -> ControllerResult<()> {
        let key = workflow.key();

        let owned = match get_workflow_jobs(self.job_store.as_ref(), &workflow) {
            Ok(owned) => owned,
            Err(e) => {
                self.queue.add(key.clone());
                return Err(e.into());
            }
        };
        let by_step = jobs_by_step(&owned);
        let by_name: HashMap<&str, &Job> = owned
            .iter()
            .map(|job| (job.metadata.name.as_str(), job))
            .collect();

        let mut status = workflow.status.clone();
        let mut attempted = 0usize;
        let mut failed = 0usize;
        let mut adopted = 0usize;

        let statuses = status.statuses.get_or_insert_with(BTreeMap::new);
        for (step_name, step) in &workflow.spec.steps {
            if statuses.contains_key(step_name) {
                continue;
            }

            if let Some(job) = by_step.get(step_name.as_str()) {
                tracing::debug!(workflow = %key, step = %step_name, job = %job.key(), "Adopting job for step");
                statuses.insert(step_name.clone(), job.object_ref());
                adopted += 1;
                continue;
            }

            attempted += 1;
            self.expectations.raise_expectations(key.clone(), 1, 0);
            match self
                .job_control
                .create_job(&workflow.metadata.namespace, &step.job_template, &workflow, step_name)
                .await
            {
                Ok(()) => {
                    self.recorder.record(
                        &workflow.object_ref(),
                        EventType::Normal,
                        reasons::SUCCESSFUL_CREATE,
                        format!("Created job for step {}", step_name),
                    );
                }
                Err(e) => {
                    failed += 1;
                    self.expectations.lower_expectations(&key, 1, 0);
                    tracing::error!(workflow = %key, step = %step_name, error = %e, "Error creating job");
                    self.recorder.record(
                        &workflow.object_ref(),
                        EventType::Warning,
                        reasons::FAILED_CREATE,
                        format!("Error creating job for step {}: {}", step_name, e),
                    );
                }
            }
        }

        if status.start_time.is_none() && (adopted > 0 || attempted > failed) {
            status.start_time = Some(Utc::now());
        }

        if !workflow.is_finished() {
            if let Some(condition) = derive_condition(&workflow, &status, &by_name) {
                if condition.condition_type == WorkflowConditionType::Complete {
                    status.completion_time = Some(Utc::now());
                }
                let (event_type, reason) = if condition.condition_type == WorkflowConditionType::Failed {
                    (EventType::Warning, reasons::WORKFLOW_FAILED)
                } else {
                    (EventType::Normal, reasons::WORKFLOW_COMPLETE)
                };
                self.recorder.record(
                    &workflow.object_ref(),
                    event_type,
                    reason,
                    condition.message.clone().unwrap_or_default(),
                );
                status.conditions.push(condition);
            }
        }

        // An empty map created above is not a change worth writing
        if workflow.status.statuses.is_none() && status.statuses.as_ref().is_some_and(BTreeMap::is_empty) {
            status.statuses = None;
        }

        if status != workflow.status {
            self.write_status(&workflow, status).await?;
        }

        if failed > 0 {
            return Err(ControllerError::PartialSync {
                workflow: key,
                attempted,
                failed,
            });
        }
        Ok(())
    }

    async fn write_status(&self, workflow: &Workflow, status: WorkflowStatus) -> ControllerResult<()> {
        let key = workflow.key();
        let mut updated = workflow.clone();
        updated.status = status;

        match self.status_writer.update_status(&updated).await {
            Ok(stored) => {
                tracing::info!(
                    workflow = %key,
                    resource_version = stored.metadata.resource_version,
                    steps = stored.status.statuses.as_ref().map_or(0, BTreeMap::len),
                    "Updated workflow status"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(workflow = %key, error = %e, "Failed to update workflow status");
                self.queue.add(key);
                Err(e.into())
            }
        }
    }
}

/// Owned jobs indexed by the step they were created for
///
/// Duplicates from at-least-once creation resolve to the smallest name.
fn jobs_by_step(owned: &[Job]) -> HashMap<&str, &Job> {
    let mut by_step: HashMap<&str, &Job> = HashMap::new();
    for job in owned {
        let Some(step) = job_step_name(job) else {
            continue;
        };
        by_step
            .entry(step)
            .and_modify(|current| {
                if job.metadata.name < current.metadata.name {
                    *current = job;
                }
            })
            .or_insert(job);
    }
    by_step
}

/// Terminal condition implied by the referenced jobs, if any
fn derive_condition(
    workflow: &Workflow,
    status: &WorkflowStatus,
    jobs: &HashMap<&str, &Job>,
) -> Option<WorkflowCondition> {
    if workflow.spec.steps.is_empty() {
        return None;
    }
    let statuses = status.statuses.as_ref()?;

    let mut referenced = Vec::with_capacity(workflow.spec.steps.len());
    for step in workflow.spec.steps.keys() {
        let reference = statuses.get(step)?;
        let job = jobs.get(reference.name.as_str())?;
        referenced.push((step, *job));
    }

    if let Some((step, job)) = referenced.iter().find(|(_, job)| job.is_failed()) {
        return Some(WorkflowCondition::now_true(
            WorkflowConditionType::Failed,
            "StepFailed",
            format!("Job {} for step {} failed", job.metadata.name, step),
        ));
    }

    if referenced.iter().all(|(_, job)| job.is_complete()) {
        return Some(WorkflowCondition::now_true(
            WorkflowConditionType::Complete,
            "StepsComplete",
            format!("All {} steps complete", referenced.len()),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        finished_workflow, new_workflow, with_job_condition, workflow_with_steps, FailingStore,
        TestHarness,
    };
    use jobflow_types::{JobConditionType, ObjectReference};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_creates_job_for_unmaterialized_step() {
        let harness = TestHarness::new();
        let workflow = new_workflow();
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        let calls = harness.job_control.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(job_step_name(&calls[0]), Some("myJob"));
        let record = harness
            .controller
            .expectations()
            .get_expectations(&workflow.key())
            .unwrap();
        assert_eq!(record.pending_adds(), 1);
    }

    #[tokio::test]
    async fn test_materialized_step_is_left_alone() {
        let harness = TestHarness::new();
        let mut workflow = new_workflow();
        let mut statuses = BTreeMap::new();
        statuses.insert(
            "myJob".to_string(),
            ObjectReference {
                kind: "Job".to_string(),
                namespace: "default".to_string(),
                name: "mydag-myjob-abcde".to_string(),
                uid: None,
            },
        );
        workflow.status.statuses = Some(statuses);
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        assert!(harness.job_control.calls().is_empty());
        assert!(harness.status_writer.writes().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_workflow_purges_expectations() {
        let harness = TestHarness::new();
        let key = new_workflow().key();
        harness.controller.expectations().raise_expectations(key.clone(), 2, 0);

        harness.controller.sync_workflow(&key).await.unwrap();

        assert!(harness.controller.expectations().get_expectations(&key).is_none());
        assert!(harness.job_control.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unsynced_job_store_requeues() {
        let harness = TestHarness::unsynced();
        let workflow = new_workflow();
        harness.workflows.upsert(workflow.clone());

        let started = Instant::now();
        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        assert!(started.elapsed() >= harness.not_ready_delay());
        assert!(harness.job_control.calls().is_empty());
        assert_eq!(harness.controller.queue().get().await, Some(workflow.key()));
    }

    #[tokio::test]
    async fn test_store_failure_requeues_and_reports() {
        let harness = TestHarness::with_workflow_store(Some(Arc::new(FailingStore::default())));
        harness.jobs.mark_synced();
        let key = new_workflow().key();

        let result = harness.controller.sync_workflow(&key).await;

        assert!(matches!(result, Err(ControllerError::Store(_))));
        assert_eq!(harness.controller.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_pass_waits_on_expectations() {
        let harness = TestHarness::new();
        let workflow = new_workflow();
        harness.workflows.upsert(workflow.clone());

        for _ in 0..3 {
            harness.controller.sync_workflow(&workflow.key()).await.unwrap();
        }
        assert_eq!(harness.job_control.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_observed_job_is_recorded_in_status() {
        let harness = TestHarness::new();
        let workflow = new_workflow();
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();
        harness.persist_last_status();
        harness.observe_created_jobs();
        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        assert_eq!(harness.job_control.calls().len(), 1);
        let written = harness.status_writer.writes().pop().unwrap();
        let created = &harness.job_control.calls()[0];
        let reference = written.step_status("myJob").unwrap();
        assert_eq!(reference.name, created.metadata.name);
        assert!(written.status.start_time.is_some());
        assert!(written.status.conditions.is_empty());
    }

    #[tokio::test]
    async fn test_all_steps_complete_marks_workflow_complete() {
        let harness = TestHarness::new();
        let workflow = workflow_with_steps(
            "default",
            "pipeline",
            &[("extract", &[("step", "extract")]), ("load", &[("step", "load")])],
        );
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();
        harness.persist_last_status();
        harness.observe_created_jobs();
        harness.controller.sync_workflow(&workflow.key()).await.unwrap();
        harness.persist_last_status();

        for job in harness.job_control.calls() {
            harness
                .jobs
                .upsert(with_job_condition(job, JobConditionType::Complete));
        }
        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        let written = harness.status_writer.writes().pop().unwrap();
        assert!(written.is_finished());
        assert_eq!(
            written.status.conditions[0].condition_type,
            WorkflowConditionType::Complete
        );
        assert!(written.status.completion_time.is_some());
        assert!(harness
            .recorder
            .recent(10)
            .iter()
            .any(|e| e.reason == reasons::WORKFLOW_COMPLETE));
    }

    #[tokio::test]
    async fn test_failed_job_fails_workflow() {
        let harness = TestHarness::new();
        let workflow = new_workflow();
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();
        harness.persist_last_status();
        harness.observe_created_jobs();
        for job in harness.job_control.calls() {
            harness
                .jobs
                .upsert(with_job_condition(job, JobConditionType::Failed));
        }
        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        let written = harness.status_writer.writes().pop().unwrap();
        assert_eq!(
            written.status.conditions[0].condition_type,
            WorkflowConditionType::Failed
        );
        assert!(written.status.completion_time.is_none());
    }

    #[tokio::test]
    async fn test_finished_workflow_conditions_are_not_recomputed() {
        let harness = TestHarness::new();
        let workflow = finished_workflow(new_workflow());
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();
        harness.persist_last_status();
        harness.observe_created_jobs();
        for job in harness.job_control.calls() {
            harness
                .jobs
                .upsert(with_job_condition(job, JobConditionType::Failed));
        }
        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        let written = harness.status_writer.writes().pop().unwrap();
        assert_eq!(written.status.conditions.len(), 1);
        assert_eq!(
            written.status.conditions[0].condition_type,
            WorkflowConditionType::Complete
        );
    }

    #[tokio::test]
    async fn test_creation_failure_continues_with_other_steps() {
        let harness = TestHarness::new();
        let workflow = workflow_with_steps(
            "default",
            "pipeline",
            &[("extract", &[("step", "extract")]), ("load", &[("step", "load")])],
        );
        harness.workflows.upsert(workflow.clone());
        harness.job_control.fail_step("extract");

        let result = harness.controller.sync_workflow(&workflow.key()).await;

        match result {
            Err(ControllerError::PartialSync {
                attempted, failed, ..
            }) => {
                assert_eq!(attempted, 2);
                assert_eq!(failed, 1);
            }
            other => panic!("expected partial sync, got {:?}", other),
        }
        let calls = harness.job_control.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(job_step_name(&calls[0]), Some("load"));
        assert_eq!(
            harness
                .controller
                .expectations()
                .get_expectations(&workflow.key())
                .unwrap()
                .pending_adds(),
            1
        );
        assert!(harness
            .recorder
            .recent(10)
            .iter()
            .any(|e| e.reason == reasons::FAILED_CREATE));
    }

    #[tokio::test]
    async fn test_status_write_failure_requeues() {
        let harness = TestHarness::new();
        let workflow = new_workflow();
        harness.workflows.upsert(workflow.clone());
        harness.status_writer.set_failing(true);

        let result = harness.controller.sync_workflow(&workflow.key()).await;

        assert!(matches!(result, Err(ControllerError::StatusWrite(_))));
        assert_eq!(harness.job_control.calls().len(), 1);
        assert_eq!(harness.controller.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_workflow_writes_nothing() {
        let harness = TestHarness::new();
        let workflow = workflow_with_steps("default", "empty", &[]);
        harness.workflows.upsert(workflow.clone());

        harness.controller.sync_workflow(&workflow.key()).await.unwrap();

        assert!(harness.job_control.calls().is_empty());
        assert!(harness.status_writer.writes().is_empty());
    }

    #[test]
    fn test_duplicate_jobs_for_step_resolve_to_smallest_name() {
        let mut a = crate::testing::job_with_labels("default", "b-job", &[]);
        a.metadata
            .annotations
            .insert(jobflow_types::STEP_ANNOTATION.to_string(), "s".to_string());
        let mut b = a.clone();
        b.metadata.name = "a-job".to_string();

        let owned = vec![a, b];
        let by_step = jobs_by_step(&owned);
        assert_eq!(by_step["s"].metadata.name, "a-job");
    }
}
