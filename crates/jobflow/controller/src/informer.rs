//! Watch feed ingestion
//!
//! An [`Informer`] applies a stream of [`FeedEvent`]s to its [`MemoryStore`]
//! and then hands the resulting [`WatchEvent`] to a handler. The store is
//! always updated before the handler runs, so a handler that enqueues a key
//! can rely on the worker seeing at least that version.

use crate::store::{MemoryStore, ObjectStore};
use jobflow_types::{ObjectKey, Resource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Raw change notification from the platform
#[derive(Debug, Clone)]
pub enum FeedEvent<T> {
    /// Object created or replaced
    Upsert(T),
    /// Object removed
    Remove(ObjectKey),
    /// Every object of the initial listing has been sent
    InitialListDone,
}

/// Change as seen by event handlers
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Modified { old: T, new: T },
    Deleted(T),
}

/// Maintains one local store from one feed
pub struct Informer<T> {
    kind: &'static str,
    store: Arc<MemoryStore<T>>,
    resync_period: Option<Duration>,
}

impl<T: Resource> Informer<T> {
    pub fn new(store: Arc<MemoryStore<T>>) -> Self {
        Self {
            kind: T::KIND,
            store,
            resync_period: None,
        }
    }

    /// Re-deliver every cached object as an unchanged update on this period
    pub fn with_resync(mut self, period: Option<Duration>) -> Self {
        self.resync_period = period;
        self
    }

    /// Apply one feed event to the store and translate it for handlers
    pub fn apply(&self, event: FeedEvent<T>) -> Option<WatchEvent<T>> {
        match event {
            FeedEvent::Upsert(object) => match self.store.upsert(object.clone()) {
                None => Some(WatchEvent::Added(object)),
                Some(old) => Some(WatchEvent::Modified { old, new: object }),
            },
            FeedEvent::Remove(key) => self.store.remove(&key).map(WatchEvent::Deleted),
            FeedEvent::InitialListDone => {
                self.store.mark_synced();
                tracing::info!(
                    kind = self.kind,
                    objects = self.store.len(),
                    writes = self.store.write_count(),
                    "informer synced"
                );
                None
            }
        }
    }

    fn resync<F>(&self, handler: &F)
    where
        F: Fn(WatchEvent<T>),
    {
        let objects = match self.store.list() {
            Ok(objects) => objects,
            Err(e) => {
                tracing::error!(kind = self.kind, error = %e, "resync listing failed");
                return;
            }
        };
        tracing::debug!(
            kind = self.kind,
            objects = objects.len(),
            writes = self.store.write_count(),
            "resync"
        );
        for object in objects {
            handler(WatchEvent::Modified {
                old: object.clone(),
                new: object,
            });
        }
    }

    /// Consume `source` until it closes or `stop` flips to true
    pub async fn run<F>(
        self,
        mut source: mpsc::Receiver<FeedEvent<T>>,
        handler: F,
        mut stop: watch::Receiver<bool>,
    ) where
        F: Fn(WatchEvent<T>) + Send + Sync,
    {
        let mut resync = self.resync_period.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tracing::debug!(kind = self.kind, "informer started");

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                event = source.recv() => match event {
                    Some(event) => {
                        if let Some(watch_event) = self.apply(event) {
                            handler(watch_event);
                        }
                    }
                    None => {
                        tracing::info!(kind = self.kind, "feed closed");
                        break;
                    }
                },
                _ = tick(&mut resync) => {
                    if self.store.has_synced() {
                        self.resync(&handler);
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(kind = self.kind, "informer stopped");
    }
}

async fn tick(resync: &mut Option<Interval>) {
    match resync {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::workflow_with_step;
    use jobflow_types::Workflow;
    use parking_lot::Mutex;

    #[test]
    fn test_apply_translates_feed_events() {
        let informer = Informer::new(Arc::new(MemoryStore::<Workflow>::new()));
        let workflow = workflow_with_step("default", "mydag", "myJob", &[("foo", "bar")]);

        assert!(matches!(
            informer.apply(FeedEvent::Upsert(workflow.clone())),
            Some(WatchEvent::Added(_))
        ));

        let mut updated = workflow.clone();
        updated.metadata.resource_version = 2;
        match informer.apply(FeedEvent::Upsert(updated.clone())) {
            Some(WatchEvent::Modified { old, new }) => {
                assert_eq!(old, workflow);
                assert_eq!(new, updated);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            informer.apply(FeedEvent::Remove(workflow.key())),
            Some(WatchEvent::Deleted(_))
        ));
        assert!(informer.apply(FeedEvent::Remove(workflow.key())).is_none());
    }

    #[test]
    fn test_initial_list_marks_store_synced() {
        let store = Arc::new(MemoryStore::<Workflow>::new());
        let informer = Informer::new(store.clone());
        assert!(!store.has_synced());
        assert!(informer.apply(FeedEvent::InitialListDone).is_none());
        assert!(store.has_synced());
    }

    #[tokio::test]
    async fn test_run_feeds_handler_until_stopped() {
        let store = Arc::new(MemoryStore::<Workflow>::new());
        let informer = Informer::new(store.clone());
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let seen = seen.clone();
            tokio::spawn(informer.run(
                rx,
                move |event| seen.lock().push(event),
                stop_rx,
            ))
        };

        let workflow = workflow_with_step("default", "mydag", "myJob", &[("foo", "bar")]);
        tx.send(FeedEvent::Upsert(workflow.clone())).await.unwrap();
        tx.send(FeedEvent::InitialListDone).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(store.has_synced());
        assert_eq!(seen.lock().as_slice(), &[WatchEvent::Added(workflow)]);
    }

    #[tokio::test]
    async fn test_resync_redelivers_unchanged_objects() {
        let store = Arc::new(MemoryStore::<Workflow>::new());
        let informer = Informer::new(store.clone()).with_resync(Some(Duration::from_millis(10)));
        let (tx, rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let seen = seen.clone();
            tokio::spawn(informer.run(rx, move |event| seen.lock().push(event), stop_rx))
        };

        tx.send(FeedEvent::Upsert(workflow_with_step("default", "a", "s", &[("k", "v")])))
            .await
            .unwrap();
        tx.send(FeedEvent::InitialListDone).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(tx);
        handle.await.unwrap();

        let seen = seen.lock();
        assert!(seen
            .iter()
            .any(|e| matches!(e, WatchEvent::Modified { old, new } if old == new)));
    }
}
