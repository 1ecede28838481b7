//! Expectations of self-caused job creations and deletions
//!
//! A reconcile pass reads from an eventually consistent cache. After it
//! creates a job, the next pass may run before that job is visible and would
//! create it again. The pass therefore records how many adds/deletes it
//! expects to observe, and later passes for the same key are skipped until the
//! watch feed reports them or the record outlives its TTL.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Default age after which a record no longer gates reconciliation
pub const DEFAULT_EXPECTATIONS_TTL: Duration = Duration::from_secs(5 * 60);

/// Outstanding adds/deletes for one key
#[derive(Debug, Clone, Copy)]
pub struct ExpectationRecord {
    add: i64,
    del: i64,
    created_at: Instant,
}

impl ExpectationRecord {
    fn new(add: i64, del: i64) -> Self {
        Self {
            add,
            del,
            created_at: Instant::now(),
        }
    }

    pub fn pending_adds(&self) -> i64 {
        self.add
    }

    pub fn pending_deletes(&self) -> i64 {
        self.del
    }

    pub fn fulfilled(&self) -> bool {
        self.add <= 0 && self.del <= 0
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Expectations cache keyed by workflow identity
#[derive(Debug)]
pub struct ControllerExpectations<K>
where
    K: Eq + Hash,
{
    records: DashMap<K, ExpectationRecord>,
    ttl: Duration,
}

impl<K> Default for ControllerExpectations<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ControllerExpectations<K>
where
    K: Eq + Hash + Clone + std::fmt::Display,
{
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_EXPECTATIONS_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    /// Whether a pass for `key` may act now
    pub fn satisfied_expectations(&self, key: &K) -> bool {
        match self.records.get(key) {
            None => true,
            Some(record) if record.fulfilled() => {
                tracing::trace!(workflow = %key, "expectations fulfilled");
                true
            }
            Some(record) if record.is_expired(self.ttl) => {
                tracing::debug!(
                    workflow = %key,
                    adds = record.add,
                    dels = record.del,
                    "expectations expired"
                );
                true
            }
            Some(record) => {
                tracing::debug!(
                    workflow = %key,
                    adds = record.add,
                    dels = record.del,
                    "waiting on expectations"
                );
                false
            }
        }
    }

    /// Replace any record for `key` with a fresh one
    pub fn set_expectations(&self, key: K, add: i64, del: i64) {
        self.records.insert(key, ExpectationRecord::new(add, del));
    }

    pub fn expect_creations(&self, key: K, adds: i64) {
        self.set_expectations(key, adds, 0);
    }

    /// Add to the outstanding counters for `key`
    ///
    /// A record that no longer gates (fulfilled or expired) is replaced by a
    /// fresh one, so a newly recorded expectation always blocks the next pass.
    pub fn raise_expectations(&self, key: K, add: i64, del: i64) {
        let ttl = self.ttl;
        self.records
            .entry(key)
            .and_modify(|record| {
                if record.fulfilled() || record.is_expired(ttl) {
                    *record = ExpectationRecord::new(add, del);
                } else {
                    record.add += add;
                    record.del += del;
                }
            })
            .or_insert_with(|| ExpectationRecord::new(add, del));
    }

    /// Take back expectations for operations that never happened
    pub fn lower_expectations(&self, key: &K, add: i64, del: i64) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.add = (record.add - add).max(0);
            record.del = (record.del - del).max(0);
        }
    }

    /// One of our creations became visible
    pub fn creation_observed(&self, key: &K) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.add = (record.add - 1).max(0);
        }
    }

    /// One of our deletions became visible
    pub fn deletion_observed(&self, key: &K) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.del = (record.del - 1).max(0);
        }
    }

    /// Forget `key` entirely; called once its workflow is gone
    pub fn delete_expectations(&self, key: &K) {
        self.records.remove(key);
    }

    pub fn get_expectations(&self, key: &K) -> Option<ExpectationRecord> {
        self.records.get(key).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
