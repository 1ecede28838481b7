//! Fixtures and fakes shared by the unit tests

use crate::config::ControllerConfig;
use crate::controller::{WorkflowController, COMPONENT};
use crate::error::{JobControlError, StatusWriteError, StoreError};
use crate::events::BroadcastRecorder;
use crate::job_control::{job_from_template, JobControl, StatusWriter};
use crate::store::{MemoryStore, ObjectStore, StoreResult};
use async_trait::async_trait;
use jobflow_types::{
    ConditionStatus, Container, Job, JobCondition, JobConditionType, JobSpec, JobTemplateSpec,
    ObjectKey, ObjectMeta, PodSpec, PodTemplateSpec, Resource, TemplateMeta, Workflow,
    WorkflowConditionType, WorkflowSpec, WorkflowStep,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn step_template(pairs: &[(&str, &str)]) -> JobTemplateSpec {
    JobTemplateSpec {
        metadata: TemplateMeta {
            labels: labels(pairs),
            annotations: BTreeMap::new(),
        },
        spec: JobSpec {
            template: PodTemplateSpec {
                metadata: TemplateMeta::default(),
                spec: PodSpec {
                    containers: vec![Container {
                        name: "baz".to_string(),
                        image: "foo/bar".to_string(),
                        ..Default::default()
                    }],
                    restart_policy: Some("Never".to_string()),
                },
            },
            ..Default::default()
        },
    }
}

pub fn workflow_with_step(ns: &str, name: &str, step: &str, pairs: &[(&str, &str)]) -> Workflow {
    workflow_with_steps(ns, name, &[(step, pairs)])
}

pub fn workflow_with_steps(ns: &str, name: &str, steps: &[(&str, &[(&str, &str)])]) -> Workflow {
    let steps = steps
        .iter()
        .map(|(step, pairs)| {
            (
                step.to_string(),
                WorkflowStep {
                    job_template: step_template(pairs),
                },
            )
        })
        .collect();
    let mut metadata = ObjectMeta::named(ns, name);
    metadata.uid = Some(format!("uid-{}", name));
    Workflow::new(metadata, WorkflowSpec { steps })
}

/// `default/mydag` with a single step `myJob` selecting `foo=bar`
pub fn new_workflow() -> Workflow {
    workflow_with_step("default", "mydag", "myJob", &[("foo", "bar")])
}

pub fn finished_workflow(mut workflow: Workflow) -> Workflow {
    workflow.status.conditions.push(jobflow_types::WorkflowCondition::now_true(
        WorkflowConditionType::Complete,
        "Completed",
        "all steps complete",
    ));
    workflow
}

pub fn job_with_labels(ns: &str, name: &str, pairs: &[(&str, &str)]) -> Job {
    let mut metadata = ObjectMeta::named(ns, name);
    metadata.labels = labels(pairs);
    Job {
        metadata,
        spec: JobSpec::default(),
        status: Default::default(),
    }
}

pub fn with_job_condition(mut job: Job, condition: JobConditionType) -> Job {
    job.status
        .conditions
        .push(JobCondition::new(condition, ConditionStatus::True));
    job
}

/// Records creations instead of performing them
#[derive(Default)]
pub struct FakeJobControl {
    created: Mutex<Vec<Job>>,
    failing_steps: Mutex<HashSet<String>>,
}

impl FakeJobControl {
    pub fn fail_step(&self, step: &str) {
        self.failing_steps.lock().insert(step.to_string());
    }

    /// Every job successfully created so far
    pub fn calls(&self) -> Vec<Job> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl JobControl for FakeJobControl {
    async fn create_job(
        &self,
        namespace: &str,
        template: &JobTemplateSpec,
        workflow: &Workflow,
        step_name: &str,
    ) -> Result<(), JobControlError> {
        if self.failing_steps.lock().contains(step_name) {
            return Err(JobControlError::Rejected {
                workflow: workflow.key(),
                step: step_name.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        let mut job = job_from_template(namespace, template, workflow, step_name);
        job.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        self.created.lock().push(job);
        Ok(())
    }
}

/// Keeps every status write
#[derive(Default)]
pub struct FakeStatusWriter {
    writes: Mutex<Vec<Workflow>>,
    fail: Mutex<bool>,
}

impl FakeStatusWriter {
    pub fn writes(&self) -> Vec<Workflow> {
        self.writes.lock().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl StatusWriter for FakeStatusWriter {
    async fn update_status(&self, workflow: &Workflow) -> Result<Workflow, StatusWriteError> {
        if *self.fail.lock() {
            return Err(StatusWriteError::Backend("etcd unavailable".to_string()));
        }
        let mut stored = workflow.clone();
        stored.metadata.resource_version += 1;
        self.writes.lock().push(stored.clone());
        Ok(stored)
    }
}

/// Store whose reads always fail
pub struct FailingStore<T>(PhantomData<T>);

impl<T> Default for FailingStore<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Resource> ObjectStore<T> for FailingStore<T> {
    fn get_by_key(&self, _key: &ObjectKey) -> StoreResult<Option<T>> {
        Err(StoreError::Unavailable("injected failure".to_string()))
    }

    fn list(&self) -> StoreResult<Vec<T>> {
        Err(StoreError::Unavailable("injected failure".to_string()))
    }

    fn has_synced(&self) -> bool {
        true
    }
}

/// Controller wired to in-memory stores and fakes
pub struct TestHarness {
    pub controller: Arc<WorkflowController>,
    pub workflows: Arc<MemoryStore<Workflow>>,
    pub jobs: Arc<MemoryStore<Job>>,
    pub job_control: Arc<FakeJobControl>,
    pub status_writer: Arc<FakeStatusWriter>,
    pub recorder: Arc<BroadcastRecorder>,
}

impl TestHarness {
    pub fn new() -> Self {
        let harness = Self::with_workflow_store(None);
        harness.jobs.mark_synced();
        harness
    }

    /// Job store left unsynced
    pub fn unsynced() -> Self {
        Self::with_workflow_store(None)
    }

    /// Controller reading workflows from `store` instead of the harness store
    pub fn with_workflow_store(store: Option<Arc<dyn ObjectStore<Workflow>>>) -> Self {
        let workflows = Arc::new(MemoryStore::<Workflow>::new());
        let jobs = Arc::new(MemoryStore::<Job>::new());
        let job_control = Arc::new(FakeJobControl::default());
        let status_writer = Arc::new(FakeStatusWriter::default());
        let recorder = Arc::new(BroadcastRecorder::new(COMPONENT, 64));

        let config = ControllerConfig {
            not_ready_requeue_millis: 10,
            failed_create_requeue_millis: 10,
            ..Default::default()
        };
        let workflow_store = store.unwrap_or_else(|| workflows.clone() as Arc<dyn ObjectStore<Workflow>>);

        let controller = WorkflowController::builder(config)
            .with_workflow_store(workflow_store)
            .with_job_store(jobs.clone())
            .with_job_control(job_control.clone())
            .with_status_writer(status_writer.clone())
            .with_recorder(recorder.clone())
            .build()
            .expect("harness controller");

        Self {
            controller: Arc::new(controller),
            workflows,
            jobs,
            job_control,
            status_writer,
            recorder,
        }
    }

    /// Deliver created jobs to the job store, as the watch feed would
    pub fn observe_created_jobs(&self) {
        for job in self.job_control.calls() {
            if self.jobs.get_by_key(&job.key()).ok().flatten().is_none() {
                self.jobs.upsert(job.clone());
                self.controller
                    .handle_job_event(crate::informer::WatchEvent::Added(job));
            }
        }
    }

    /// Apply the last status write back onto the workflow store
    pub fn persist_last_status(&self) {
        if let Some(written) = self.status_writer.writes().pop() {
            self.workflows.upsert(written);
        }
    }

    pub fn not_ready_delay(&self) -> Duration {
        self.controller.config().not_ready_requeue_delay()
    }
}
