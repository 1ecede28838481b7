//! Workflow controller: wiring, worker pool and lifecycle

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::events::{BroadcastRecorder, EventRecorder};
use crate::expectations::ControllerExpectations;
use crate::informer::{FeedEvent, Informer};
use crate::job_control::{JobControl, StatusWriter};
use crate::queue::WorkQueue;
use crate::store::{MemoryStore, ObjectStore};
use jobflow_types::{Job, ObjectKey, Resource, Workflow};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Component name used on recorded events
pub const COMPONENT: &str = "workflow-controller";

/// An informer paired with the channel it reads from
pub struct WatchFeed<T> {
    informer: Informer<T>,
    source: mpsc::Receiver<FeedEvent<T>>,
}

impl<T: Resource> WatchFeed<T> {
    pub fn new(store: Arc<MemoryStore<T>>, source: mpsc::Receiver<FeedEvent<T>>) -> Self {
        Self {
            informer: Informer::new(store),
            source,
        }
    }

    /// Feed over `store` plus the sender the platform side writes into
    pub fn channel(store: Arc<MemoryStore<T>>, capacity: usize) -> (mpsc::Sender<FeedEvent<T>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(store, rx))
    }
}

/// Reconciles workflows by creating one job per step
pub struct WorkflowController {
    pub(crate) config: ControllerConfig,
    pub(crate) workflow_store: Arc<dyn ObjectStore<Workflow>>,
    pub(crate) job_store: Arc<dyn ObjectStore<Job>>,
    pub(crate) job_control: Arc<dyn JobControl>,
    pub(crate) status_writer: Arc<dyn StatusWriter>,
    pub(crate) recorder: Arc<dyn EventRecorder>,
    pub(crate) expectations: ControllerExpectations<ObjectKey>,
    pub(crate) queue: WorkQueue<ObjectKey>,
}

impl WorkflowController {
    pub fn builder(config: ControllerConfig) -> WorkflowControllerBuilder {
        WorkflowControllerBuilder::new(config)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn queue(&self) -> &WorkQueue<ObjectKey> {
        &self.queue
    }

    pub fn expectations(&self) -> &ControllerExpectations<ObjectKey> {
        &self.expectations
    }

    /// Start both feeds and `workers` reconcile workers, then block until
    /// `shutdown` resolves. In-flight passes finish; nothing is rolled back.
    pub async fn run<S>(
        self: Arc<Self>,
        workers: usize,
        workflows: WatchFeed<Workflow>,
        jobs: WatchFeed<Job>,
        shutdown: S,
    ) where
        S: Future<Output = ()> + Send,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let resync = self.config.resync_period();
        let mut tasks = JoinSet::new();

        {
            let controller = self.clone();
            let informer = workflows.informer.with_resync(resync);
            tasks.spawn(informer.run(
                workflows.source,
                move |event| controller.handle_workflow_event(event),
                stop_rx.clone(),
            ));
        }
        {
            let controller = self.clone();
            let informer = jobs.informer.with_resync(resync);
            tasks.spawn(informer.run(
                jobs.source,
                move |event| controller.handle_job_event(event),
                stop_rx.clone(),
            ));
        }

        let workers = workers.max(1);
        for id in 0..workers {
            let controller = self.clone();
            tasks.spawn(async move { controller.worker(id).await });
        }

        tracing::info!(workers, "Starting workflow controller");

        shutdown.await;

        tracing::info!("Shutting down workflow controller");
        let _ = stop_tx.send(true);
        self.queue.shut_down();

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "controller task panicked");
            }
        }

        tracing::info!("Workflow controller stopped");
    }

    /// Dequeue and reconcile keys until the queue shuts down.
    /// The queue guarantees a key is never held by two workers at once.
    async fn worker(&self, id: usize) {
        tracing::debug!(worker = id, "worker started");
        while self.process_next_work_item().await {}
        tracing::debug!(worker = id, "worker exiting");
    }

    /// Reconcile one key; returns false once the queue has shut down
    pub async fn process_next_work_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let result = self.sync_workflow(&key).await;
        self.queue.done(&key);

        if let Err(e) = result {
            tracing::error!(workflow = %key, error = %e, "Error syncing workflow");
            // Failed creations emit no watch event to retrigger the key
            if matches!(e, ControllerError::PartialSync { .. }) {
                let delay = self.config.failed_create_requeue_delay();
                tracing::debug!(workflow = %key, delay = ?delay, "Requeueing workflow after failed creations");
                tokio::time::sleep(delay).await;
                self.queue.add(key);
            }
        }
        true
    }
}

/// Builder for [`WorkflowController`]
pub struct WorkflowControllerBuilder {
    config: ControllerConfig,
    workflow_store: Option<Arc<dyn ObjectStore<Workflow>>>,
    job_store: Option<Arc<dyn ObjectStore<Job>>>,
    job_control: Option<Arc<dyn JobControl>>,
    status_writer: Option<Arc<dyn StatusWriter>>,
    recorder: Option<Arc<dyn EventRecorder>>,
}

impl WorkflowControllerBuilder {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            workflow_store: None,
            job_store: None,
            job_control: None,
            status_writer: None,
            recorder: None,
        }
    }

    /// Set the workflow cache
    pub fn with_workflow_store(mut self, store: Arc<dyn ObjectStore<Workflow>>) -> Self {
        self.workflow_store = Some(store);
        self
    }

    /// Set the job cache
    pub fn with_job_store(mut self, store: Arc<dyn ObjectStore<Job>>) -> Self {
        self.job_store = Some(store);
        self
    }

    pub fn with_job_control(mut self, job_control: Arc<dyn JobControl>) -> Self {
        self.job_control = Some(job_control);
        self
    }

    pub fn with_status_writer(mut self, writer: Arc<dyn StatusWriter>) -> Self {
        self.status_writer = Some(writer);
        self
    }

    /// Set the event sink; defaults to a [`BroadcastRecorder`]
    pub fn with_recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn build(self) -> ControllerResult<WorkflowController> {
        let workflow_store = self
            .workflow_store
            .ok_or_else(|| ControllerError::Config("workflow_store required".into()))?;
        let job_store = self
            .job_store
            .ok_or_else(|| ControllerError::Config("job_store required".into()))?;
        let job_control = self
            .job_control
            .ok_or_else(|| ControllerError::Config("job_control required".into()))?;
        let status_writer = self
            .status_writer
            .ok_or_else(|| ControllerError::Config("status_writer required".into()))?;
        let recorder = self.recorder.unwrap_or_else(|| {
            Arc::new(BroadcastRecorder::new(COMPONENT, self.config.event_buffer))
        });

        Ok(WorkflowController {
            expectations: ControllerExpectations::with_ttl(self.config.expectations_ttl()),
            queue: WorkQueue::new(),
            config: self.config,
            workflow_store,
            job_store,
            job_control,
            status_writer,
            recorder,
        })
    }
}
