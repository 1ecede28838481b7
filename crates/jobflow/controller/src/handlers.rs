//! Watch event handlers
//!
//! Handlers never reconcile. They translate a change into the workflow key
//! that needs a pass and put it on the queue, adjusting expectations for job
//! events on the way.

use crate::controller::WorkflowController;
use crate::events::{reasons, EventType};
use crate::informer::WatchEvent;
use crate::store::get_job_workflows;
use jobflow_types::{Job, Resource, Workflow};

impl WorkflowController {
    pub fn handle_workflow_event(&self, event: WatchEvent<Workflow>) {
        match event {
            WatchEvent::Added(workflow) => self.add_workflow(&workflow),
            WatchEvent::Modified { old, new } => self.update_workflow(&old, &new),
            WatchEvent::Deleted(workflow) => self.delete_workflow(&workflow),
        }
    }

    pub fn handle_job_event(&self, event: WatchEvent<Job>) {
        match event {
            WatchEvent::Added(job) => self.add_job(&job),
            WatchEvent::Modified { old, new } => self.update_job(&old, &new),
            WatchEvent::Deleted(job) => self.delete_job(&job),
        }
    }

    pub fn enqueue_workflow(&self, workflow: &Workflow) {
        self.queue.add(workflow.key());
    }

    fn add_workflow(&self, workflow: &Workflow) {
        tracing::debug!(workflow = %workflow.key(), "Adding workflow");
        self.enqueue_workflow(workflow);
    }

    fn update_workflow(&self, _old: &Workflow, new: &Workflow) {
        if new.is_finished() {
            return;
        }
        tracing::debug!(workflow = %new.key(), "Updating workflow");
        self.enqueue_workflow(new);
    }

    fn delete_workflow(&self, workflow: &Workflow) {
        tracing::debug!(workflow = %workflow.key(), "Deleting workflow");
        self.enqueue_workflow(workflow);
    }

    fn add_job(&self, job: &Job) {
        if let Some(workflow) = self.resolve_job_owner(job) {
            let key = workflow.key();
            tracing::debug!(job = %job.key(), workflow = %key, "Job added");
            self.expectations.creation_observed(&key);
            self.queue.add(key);
        }
    }

    fn update_job(&self, old: &Job, new: &Job) {
        if old == new {
            // Periodic resync
            return;
        }

        if let Some(workflow) = self.resolve_job_owner(new) {
            self.enqueue_workflow(&workflow);
        }

        // A label change can move the job to a different workflow
        if old.metadata.labels != new.metadata.labels {
            if let Some(workflow) = self.resolve_job_owner(old) {
                self.enqueue_workflow(&workflow);
            }
        }
    }

    fn delete_job(&self, job: &Job) {
        if let Some(workflow) = self.resolve_job_owner(job) {
            let key = workflow.key();
            tracing::debug!(job = %job.key(), workflow = %key, "Job deleted");
            self.expectations.deletion_observed(&key);
            self.queue.add(key);
        }
    }

    /// The workflow a job belongs to, by label selection
    ///
    /// With several candidates the one with the smallest key wins, so every
    /// event for the same job resolves to the same owner.
    pub fn resolve_job_owner(&self, job: &Job) -> Option<Workflow> {
        let mut candidates = match get_job_workflows(self.workflow_store.as_ref(), job) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::debug!(job = %job.key(), error = %e, "No workflows found for job");
                return None;
            }
        };

        match candidates.len() {
            0 => {
                tracing::debug!(job = %job.key(), "No workflows found for job");
                None
            }
            1 => candidates.pop(),
            n => {
                candidates.sort_by_key(|w| w.key());
                let chosen = candidates.swap_remove(0);
                tracing::warn!(
                    job = %job.key(),
                    candidates = n,
                    chosen = %chosen.key(),
                    "More than one workflow selects job"
                );
                self.recorder.record(
                    &job.object_ref(),
                    EventType::Warning,
                    reasons::AMBIGUOUS_OWNER,
                    format!(
                        "{} workflows select job {}; using {}",
                        n,
                        job.key(),
                        chosen.key()
                    ),
                );
                Some(chosen)
            }
        }
    }
}
