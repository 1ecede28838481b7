//! Local object caches
//!
//! Each resource kind gets a [`MemoryStore`] maintained by its informer. The
//! reconciler only sees the read side, [`ObjectStore`], so tests can inject
//! stores that fail or never sync.

use crate::error::StoreError;
use dashmap::DashMap;
use jobflow_types::{Job, ObjectKey, Resource, Workflow};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Result type for store reads
pub type StoreResult<T> = Result<T, StoreError>;

/// Read side of a local cache
pub trait ObjectStore<T: Resource>: Send + Sync {
    /// Look up one object by key
    fn get_by_key(&self, key: &ObjectKey) -> StoreResult<Option<T>>;

    /// Snapshot of every cached object
    fn list(&self) -> StoreResult<Vec<T>>;

    /// Whether the initial listing has been fully applied
    fn has_synced(&self) -> bool;
}

/// Concurrent in-memory cache with a readiness flag
#[derive(Debug)]
pub struct MemoryStore<T> {
    objects: DashMap<ObjectKey, T>,
    synced: AtomicBool,
    writes: AtomicU64,
}

impl<T: Resource> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Resource> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            synced: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Insert or replace an object, returning the previous version
    pub fn upsert(&self, object: T) -> Option<T> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.objects.insert(object.key(), object)
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<T> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.objects.remove(key).map(|(_, object)| object)
    }

    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total number of writes applied; reported by informers on sync and resync
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl<T: Resource> ObjectStore<T> for MemoryStore<T> {
    fn get_by_key(&self, key: &ObjectKey) -> StoreResult<Option<T>> {
        Ok(self.objects.get(key).map(|o| o.clone()))
    }

    fn list(&self) -> StoreResult<Vec<T>> {
        Ok(self.objects.iter().map(|o| o.value().clone()).collect())
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

/// Workflows in the job's namespace whose step templates select its labels
pub fn get_job_workflows(
    workflows: &dyn ObjectStore<Workflow>,
    job: &Job,
) -> StoreResult<Vec<Workflow>> {
    let namespace = &job.metadata.namespace;
    Ok(workflows
        .list()?
        .into_iter()
        .filter(|w| &w.metadata.namespace == namespace && w.selects(&job.metadata.labels))
        .collect())
}

/// Jobs whose controller reference points at `workflow`
///
/// When both sides carry a uid they must agree, so a job left behind by a
/// deleted workflow is not adopted by a new one with the same name.
pub fn get_workflow_jobs(jobs: &dyn ObjectStore<Job>, workflow: &Workflow) -> StoreResult<Vec<Job>> {
    let meta = &workflow.metadata;
    Ok(jobs
        .list()?
        .into_iter()
        .filter(|job| {
            job.metadata.namespace == meta.namespace
                && job.metadata.controller_ref().is_some_and(|owner| {
                    owner.kind == Workflow::KIND
                        && owner.name == meta.name
                        && match (&owner.uid, &meta.uid) {
                            (Some(a), Some(b)) => a == b,
                            _ => true,
                        }
                })
        })
        .collect())
}
