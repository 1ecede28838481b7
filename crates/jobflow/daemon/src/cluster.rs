//! In-process cluster
//!
//! `LocalCluster` is the authoritative home of workflows and jobs for a
//! standalone daemon. It assigns identities and resource versions, forwards
//! every change to the controller's watch feeds, and plays the platform side
//! of the job-control and status-write boundaries.

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use jobflow_controller::{
    job_from_template, FeedEvent, JobControl, JobControlError, StatusWriteError, StatusWriter,
};
use jobflow_types::{
    ConditionStatus, Job, JobCondition, JobConditionType, JobStatus, JobTemplateSpec, LabelSelector,
    Manifest, ObjectKey, ObjectMeta, Resource, Workflow, WorkflowStatus,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Outcome of an apply
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub object: T,
    pub created: bool,
}

pub struct LocalCluster {
    config: ClusterConfig,
    workflows: DashMap<ObjectKey, Workflow>,
    jobs: DashMap<ObjectKey, Job>,
    workflow_tx: mpsc::Sender<FeedEvent<Workflow>>,
    job_tx: mpsc::Sender<FeedEvent<Job>>,
    // Serializes mutation + publish so feeds see writes in commit order
    write_lock: Mutex<()>,
    resource_version: AtomicU64,
    completions: mpsc::UnboundedSender<ObjectKey>,
    completion_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<ObjectKey>>>,
}

impl LocalCluster {
    pub fn new(
        config: ClusterConfig,
        workflow_tx: mpsc::Sender<FeedEvent<Workflow>>,
        job_tx: mpsc::Sender<FeedEvent<Job>>,
    ) -> Arc<Self> {
        let (completions, completion_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            config,
            workflows: DashMap::new(),
            jobs: DashMap::new(),
            workflow_tx,
            job_tx,
            write_lock: Mutex::new(()),
            resource_version: AtomicU64::new(0),
            completions,
            completion_rx: parking_lot::Mutex::new(Some(completion_rx)),
        })
    }

    fn next_version(&self) -> u64 {
        self.resource_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn publish_workflow(&self, event: FeedEvent<Workflow>) {
        if self.workflow_tx.send(event).await.is_err() {
            tracing::debug!("workflow feed closed");
        }
    }

    async fn publish_job(&self, event: FeedEvent<Job>) {
        if self.job_tx.send(event).await.is_err() {
            tracing::debug!("job feed closed");
        }
    }

    /// Tell both feeds that everything already applied has been delivered
    pub async fn finish_initial_list(&self) {
        let _guard = self.write_lock.lock().await;
        self.publish_workflow(FeedEvent::InitialListDone).await;
        self.publish_job(FeedEvent::InitialListDone).await;
        tracing::info!(
            workflows = self.workflows.len(),
            jobs = self.jobs.len(),
            "Initial listing delivered"
        );
    }

    /// Apply every manifest in `dir`, returning how many objects were applied
    pub async fn load_manifests(&self, dir: &Path) -> Result<usize, crate::error::DaemonError> {
        let manifests = jobflow_types::read_manifest_dir(dir)?;
        let count = manifests.len();
        for manifest in manifests {
            self.apply(manifest).await?;
        }
        tracing::info!(dir = %dir.display(), objects = count, "Loaded manifests");
        Ok(count)
    }

    pub async fn apply(&self, manifest: Manifest) -> ClusterResult<Manifest> {
        Ok(match manifest {
            Manifest::Workflow(w) => Manifest::Workflow(self.apply_workflow(w).await?.object),
            Manifest::Job(j) => Manifest::Job(self.apply_job(j).await?.object),
        })
    }

    /// Create or replace a workflow
    ///
    /// Replacing keeps the stored uid, creation time and status; only the
    /// declared fields come from `workflow`.
    pub async fn apply_workflow(&self, mut workflow: Workflow) -> ClusterResult<Applied<Workflow>> {
        validate_meta(&workflow.metadata)?;
        validate_steps(&workflow)?;
        let _guard = self.write_lock.lock().await;

        let key = workflow.key();
        let created = match self.workflows.get(&key) {
            Some(stored) => {
                workflow.metadata.uid = stored.metadata.uid.clone();
                workflow.metadata.creation_timestamp = stored.metadata.creation_timestamp;
                workflow.status = stored.status.clone();
                false
            }
            None => {
                workflow.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
                workflow.metadata.creation_timestamp = Some(Utc::now());
                workflow.status = WorkflowStatus::default();
                true
            }
        };
        workflow.metadata.resource_version = self.next_version();
        self.workflows.insert(key.clone(), workflow.clone());

        tracing::info!(workflow = %key, created, "Applied workflow");
        self.publish_workflow(FeedEvent::Upsert(workflow.clone())).await;

        Ok(Applied {
            object: workflow,
            created,
        })
    }

    pub fn get_workflow(&self, key: &ObjectKey) -> ClusterResult<Workflow> {
        self.workflows
            .get(key)
            .map(|w| w.clone())
            .ok_or_else(|| ClusterError::NotFound {
                kind: Workflow::KIND,
                key: key.clone(),
            })
    }

    /// Workflows in `namespace` (all when `None`) matching `selector`, sorted by key
    pub fn list_workflows(
        &self,
        namespace: Option<&str>,
        selector: Option<&LabelSelector>,
    ) -> Vec<Workflow> {
        filter_sorted(&self.workflows, namespace, selector)
    }

    /// Delete a workflow and every job it controls
    pub async fn delete_workflow(&self, key: &ObjectKey) -> ClusterResult<Workflow> {
        let _guard = self.write_lock.lock().await;

        let (_, workflow) = self.workflows.remove(key).ok_or_else(|| ClusterError::NotFound {
            kind: Workflow::KIND,
            key: key.clone(),
        })?;
        self.publish_workflow(FeedEvent::Remove(key.clone())).await;

        let owned: Vec<ObjectKey> = self
            .jobs
            .iter()
            .filter(|job| is_controlled_by(job.value(), &workflow))
            .map(|job| job.key().clone())
            .collect();
        for job_key in &owned {
            if self.jobs.remove(job_key).is_some() {
                self.publish_job(FeedEvent::Remove(job_key.clone())).await;
            }
        }

        tracing::info!(workflow = %key, jobs = owned.len(), "Deleted workflow");
        Ok(workflow)
    }

    /// Delete every workflow in `namespace` matching `selector`
    pub async fn delete_workflows(&self, namespace: &str, selector: &LabelSelector) -> Vec<Workflow> {
        let mut deleted = Vec::new();
        for workflow in self.list_workflows(Some(namespace), Some(selector)) {
            if let Ok(workflow) = self.delete_workflow(&workflow.key()).await {
                deleted.push(workflow);
            }
        }
        deleted
    }

    /// Create or replace a job
    pub async fn apply_job(&self, mut job: Job) -> ClusterResult<Applied<Job>> {
        validate_meta(&job.metadata)?;
        let _guard = self.write_lock.lock().await;

        let key = job.key();
        let created = match self.jobs.get(&key) {
            Some(stored) => {
                job.metadata.uid = stored.metadata.uid.clone();
                job.metadata.creation_timestamp = stored.metadata.creation_timestamp;
                job.status = stored.status.clone();
                false
            }
            None => {
                job.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
                job.metadata.creation_timestamp = Some(Utc::now());
                true
            }
        };
        job.metadata.resource_version = self.next_version();
        self.jobs.insert(key.clone(), job.clone());

        tracing::info!(job = %key, created, "Applied job");
        self.publish_job(FeedEvent::Upsert(job.clone())).await;

        Ok(Applied {
            object: job,
            created,
        })
    }

    pub fn get_job(&self, key: &ObjectKey) -> ClusterResult<Job> {
        self.jobs
            .get(key)
            .map(|j| j.clone())
            .ok_or_else(|| ClusterError::NotFound {
                kind: Job::KIND,
                key: key.clone(),
            })
    }

    pub fn list_jobs(&self, namespace: Option<&str>, selector: Option<&LabelSelector>) -> Vec<Job> {
        filter_sorted(&self.jobs, namespace, selector)
    }

    pub async fn delete_job(&self, key: &ObjectKey) -> ClusterResult<Job> {
        let _guard = self.write_lock.lock().await;

        let (_, job) = self.jobs.remove(key).ok_or_else(|| ClusterError::NotFound {
            kind: Job::KIND,
            key: key.clone(),
        })?;
        self.publish_job(FeedEvent::Remove(key.clone())).await;

        tracing::info!(job = %key, "Deleted job");
        Ok(job)
    }

    pub async fn delete_jobs(&self, namespace: &str, selector: &LabelSelector) -> Vec<Job> {
        let mut deleted = Vec::new();
        for job in self.list_jobs(Some(namespace), Some(selector)) {
            if let Ok(job) = self.delete_job(&job.key()).await {
                deleted.push(job);
            }
        }
        deleted
    }

    /// Record a terminal outcome for a job; a job that already finished is left as is
    pub async fn finish_job(&self, key: &ObjectKey, outcome: JobConditionType) -> ClusterResult<Job> {
        let _guard = self.write_lock.lock().await;

        let job = {
            let mut stored = self.jobs.get_mut(key).ok_or_else(|| ClusterError::NotFound {
                kind: Job::KIND,
                key: key.clone(),
            })?;
            if stored.is_finished() {
                return Ok(stored.clone());
            }

            let status = &mut stored.status;
            status.active = 0;
            match outcome {
                JobConditionType::Complete => {
                    status.succeeded += 1;
                    status.completion_time = Some(Utc::now());
                }
                JobConditionType::Failed => status.failed += 1,
            }
            status
                .conditions
                .push(JobCondition::new(outcome, ConditionStatus::True));
            stored.metadata.resource_version = self.next_version();
            stored.clone()
        };

        tracing::info!(job = %key, outcome = ?outcome, "Job finished");
        self.publish_job(FeedEvent::Upsert(job.clone())).await;
        Ok(job)
    }

    /// Start completing created jobs after the configured run time
    ///
    /// Returns `None` when simulation is disabled or already started.
    pub fn spawn_job_simulator(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.simulate_job_completion {
            return None;
        }
        let mut rx = self.completion_rx.lock().take()?;
        let cluster = Arc::downgrade(self);
        let delay = self.config.job_completion_delay();

        Some(tokio::spawn(async move {
            while let Some(key) = rx.recv().await {
                let cluster = cluster.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let Some(cluster) = cluster.upgrade() else {
                        return;
                    };
                    if let Err(e) = cluster.finish_job(&key, JobConditionType::Complete).await {
                        tracing::debug!(job = %key, error = %e, "Simulated job vanished");
                    }
                });
            }
        }))
    }
}

#[async_trait]
impl JobControl for LocalCluster {
    async fn create_job(
        &self,
        namespace: &str,
        template: &JobTemplateSpec,
        workflow: &Workflow,
        step_name: &str,
    ) -> Result<(), JobControlError> {
        let mut job = job_from_template(namespace, template, workflow, step_name);
        let _guard = self.write_lock.lock().await;

        let key = job.key();
        if self.jobs.contains_key(&key) {
            return Err(JobControlError::AlreadyExists(key));
        }
        job.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        job.metadata.resource_version = self.next_version();
        job.status = JobStatus {
            active: 1,
            start_time: Some(Utc::now()),
            ..Default::default()
        };
        self.jobs.insert(key.clone(), job.clone());

        tracing::info!(job = %key, workflow = %workflow.key(), step = step_name, "Created job");
        self.publish_job(FeedEvent::Upsert(job)).await;

        if self.config.simulate_job_completion {
            let _ = self.completions.send(key);
        }
        Ok(())
    }
}

#[async_trait]
impl StatusWriter for LocalCluster {
    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow, StatusWriteError> {
        let key = workflow.key();
        let _guard = self.write_lock.lock().await;

        let updated = {
            let mut stored = self
                .workflows
                .get_mut(&key)
                .ok_or_else(|| StatusWriteError::NotFound(key.clone()))?;
            if stored.metadata.resource_version != workflow.metadata.resource_version {
                return Err(StatusWriteError::Conflict {
                    key,
                    stored: stored.metadata.resource_version,
                    written: workflow.metadata.resource_version,
                });
            }
            stored.status = workflow.status.clone();
            stored.metadata.resource_version = self.next_version();
            stored.clone()
        };

        self.publish_workflow(FeedEvent::Upsert(updated.clone())).await;
        Ok(updated)
    }
}

fn validate_meta(meta: &ObjectMeta) -> ClusterResult<()> {
    if meta.name.is_empty() {
        return Err(ClusterError::Invalid("metadata.name is required".to_string()));
    }
    if meta.namespace.is_empty() {
        return Err(ClusterError::Invalid(format!(
            "metadata.namespace of {} is empty",
            meta.name
        )));
    }
    Ok(())
}

/// Jobs are matched to their workflow by label, so a step whose template
/// carries no labels would create a job no workflow ever selects
fn validate_steps(workflow: &Workflow) -> ClusterResult<()> {
    match workflow
        .spec
        .steps
        .iter()
        .find(|(_, step)| step.job_template.metadata.labels.is_empty())
    {
        Some((name, _)) => Err(ClusterError::Invalid(format!(
            "step {} of workflow {} has no job template labels",
            name,
            workflow.key()
        ))),
        None => Ok(()),
    }
}

fn is_controlled_by(job: &Job, workflow: &Workflow) -> bool {
    job.metadata.namespace == workflow.metadata.namespace
        && job.metadata.controller_ref().is_some_and(|owner| {
            owner.kind == Workflow::KIND
                && owner.name == workflow.metadata.name
                && owner.uid == workflow.metadata.uid
        })
}

fn filter_sorted<T: Resource>(
    objects: &DashMap<ObjectKey, T>,
    namespace: Option<&str>,
    selector: Option<&LabelSelector>,
) -> Vec<T> {
    let mut matched: Vec<T> = objects
        .iter()
        .filter(|entry| {
            let meta = entry.value().meta();
            namespace.map_or(true, |ns| meta.namespace == ns)
                && selector.map_or(true, |s| s.matches(&meta.labels))
        })
        .map(|entry| entry.value().clone())
        .collect();
    matched.sort_by_key(|o| o.key());
    matched
}
