//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::cluster::LocalCluster;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use jobflow_controller::{BroadcastRecorder, MemoryStore, WatchFeed, WorkflowController, COMPONENT};
use jobflow_types::{Job, Workflow};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cluster, controller and the feeds between them
pub struct ControlPlane {
    config: DaemonConfig,
    pub cluster: Arc<LocalCluster>,
    pub controller: Arc<WorkflowController>,
    pub recorder: Arc<BroadcastRecorder>,
    feeds: Option<(WatchFeed<Workflow>, WatchFeed<Job>)>,
}

impl ControlPlane {
    /// Wire everything up; nothing runs until [`ControlPlane::start`]
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let buffer = config.controller.event_buffer;

        let workflow_store = Arc::new(MemoryStore::<Workflow>::new());
        let job_store = Arc::new(MemoryStore::<Job>::new());
        let (workflow_tx, workflow_feed) = WatchFeed::channel(workflow_store.clone(), buffer);
        let (job_tx, job_feed) = WatchFeed::channel(job_store.clone(), buffer);

        let cluster = LocalCluster::new(config.cluster.clone(), workflow_tx, job_tx);
        let recorder = Arc::new(BroadcastRecorder::new(COMPONENT, buffer));

        let controller = WorkflowController::builder(config.controller.clone())
            .with_workflow_store(workflow_store)
            .with_job_store(job_store)
            .with_job_control(cluster.clone())
            .with_status_writer(cluster.clone())
            .with_recorder(recorder.clone())
            .build()?;

        Ok(Self {
            config,
            cluster,
            controller: Arc::new(controller),
            recorder,
            feeds: Some((workflow_feed, job_feed)),
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.cluster.clone(),
            self.controller.clone(),
            self.recorder.clone(),
        )
    }

    /// Start the controller and job simulator, load manifests and deliver the
    /// initial listing. The returned task ends once `shutdown` resolves and
    /// every worker has exited.
    pub async fn start<S>(&mut self, shutdown: S) -> DaemonResult<JoinHandle<()>>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (workflow_feed, job_feed) = self
            .feeds
            .take()
            .ok_or_else(|| DaemonError::Server("control plane already started".to_string()))?;

        let workers = self.config.controller.workers;
        let controller = tokio::spawn(self.controller.clone().run(
            workers,
            workflow_feed,
            job_feed,
            shutdown,
        ));

        if self.cluster.spawn_job_simulator().is_some() {
            tracing::info!(
                millis = self.config.cluster.job_completion_millis,
                "Simulating job completion"
            );
        }

        if let Some(dir) = &self.config.cluster.manifests_dir {
            self.cluster.load_manifests(dir).await?;
        }
        self.cluster.finish_initial_list().await;

        Ok(controller)
    }
}

/// Jobflow Daemon Server
pub struct Server {
    config: DaemonConfig,
    plane: ControlPlane,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let plane = ControlPlane::new(config.clone())?;
        Ok(Self { config, plane })
    }

    /// Run the server
    pub async fn run(mut self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        // Fan the process signal out to the HTTP server and the controller
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = self.plane.start(wait_for(shutdown_rx.clone())).await?;

        let app = create_router(self.plane.app_state(), self.config.server.enable_cors);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Jobflow daemon listening on {}", addr);

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = shutdown_tx.send(true);
            })
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Jobflow daemon shutting down");

        controller
            .await
            .map_err(|e| DaemonError::Server(format!("controller task failed: {}", e)))?;

        Ok(())
    }
}

/// Resolve once the flag flips to true or its sender is dropped
async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
