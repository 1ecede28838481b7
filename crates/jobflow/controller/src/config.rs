//! Controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the workflow controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Age after which unmet expectations stop gating a workflow
    #[serde(default = "default_expectations_ttl")]
    pub expectations_ttl_secs: u64,

    /// Delay before re-enqueuing a workflow whose job store has not synced
    #[serde(default = "default_not_ready_requeue")]
    pub not_ready_requeue_millis: u64,

    /// Delay before retrying a workflow after one of its job creations failed
    #[serde(default = "default_failed_create_requeue")]
    pub failed_create_requeue_millis: u64,

    /// Full re-delivery period for informers; 0 disables resync
    #[serde(default = "default_resync_period")]
    pub resync_period_secs: u64,

    /// Capacity of the controller event broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            expectations_ttl_secs: default_expectations_ttl(),
            not_ready_requeue_millis: default_not_ready_requeue(),
            failed_create_requeue_millis: default_failed_create_requeue(),
            resync_period_secs: default_resync_period(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ControllerConfig {
    pub fn expectations_ttl(&self) -> Duration {
        Duration::from_secs(self.expectations_ttl_secs)
    }

    pub fn not_ready_requeue_delay(&self) -> Duration {
        Duration::from_millis(self.not_ready_requeue_millis)
    }

    pub fn failed_create_requeue_delay(&self) -> Duration {
        Duration::from_millis(self.failed_create_requeue_millis)
    }

    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_secs > 0).then(|| Duration::from_secs(self.resync_period_secs))
    }
}

// Default value helpers
fn default_workers() -> usize {
    5
}

fn default_expectations_ttl() -> u64 {
    5 * 60
}

fn default_not_ready_requeue() -> u64 {
    100
}

fn default_failed_create_requeue() -> u64 {
    1000
}

fn default_resync_period() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.expectations_ttl(), Duration::from_secs(300));
        assert_eq!(config.not_ready_requeue_delay(), Duration::from_millis(100));
        assert_eq!(config.failed_create_requeue_delay(), Duration::from_secs(1));
        assert_eq!(config.resync_period(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_resync_disables_it() {
        let config = ControllerConfig {
            resync_period_secs: 0,
            ..Default::default()
        };
        assert!(config.resync_period().is_none());
    }
}
