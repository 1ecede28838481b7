//! Jobflow Controller
//!
//! A level-triggered controller that materializes every step of a
//! [`Workflow`](jobflow_types::Workflow) as a [`Job`](jobflow_types::Job).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   ┌────────────────┐
//! │ workflow feed  │   │    job feed    │
//! └───────┬────────┘   └───────┬────────┘
//!         │ Informer           │ Informer
//!         ▼                    ▼
//!   MemoryStore<Workflow>  MemoryStore<Job>
//!         │ handlers           │ handlers (+ expectations)
//!         └─────────┬──────────┘
//!                   ▼
//!              WorkQueue<ObjectKey>
//!                   │ N workers
//!                   ▼
//!            sync_workflow(key) ──► JobControl / StatusWriter
//! ```
//!
//! Event handlers only enqueue keys. Every decision is made by
//! [`WorkflowController::sync_workflow`] from the current contents of the
//! local stores, so a missed or duplicated event costs at most an extra pass.

#![deny(unsafe_code)]

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod expectations;
mod handlers;
pub mod informer;
pub mod job_control;
pub mod queue;
pub mod store;
mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ControllerConfig;
pub use controller::{WatchFeed, WorkflowController, WorkflowControllerBuilder, COMPONENT};
pub use error::{ControllerError, ControllerResult, JobControlError, StatusWriteError, StoreError};
pub use events::{reasons, BroadcastRecorder, ControllerEvent, EventRecorder, EventType};
pub use expectations::{ControllerExpectations, ExpectationRecord, DEFAULT_EXPECTATIONS_TTL};
pub use informer::{FeedEvent, Informer, WatchEvent};
pub use job_control::{generate_job_name, job_from_template, job_step_name, JobControl, StatusWriter};
pub use queue::WorkQueue;
pub use store::{get_job_workflows, get_workflow_jobs, MemoryStore, ObjectStore, StoreResult};
