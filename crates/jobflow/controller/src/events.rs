//! Event recording
//!
//! Human-readable notices about what the controller did to an object. The
//! recorder is handed to the controller at construction; nothing here is
//! global.

use chrono::{DateTime, Utc};
use jobflow_types::ObjectReference;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

/// Event reasons emitted by the controller
pub mod reasons {
    pub const SUCCESSFUL_CREATE: &str = "SuccessfulCreate";
    pub const FAILED_CREATE: &str = "FailedCreate";
    pub const AMBIGUOUS_OWNER: &str = "AmbiguousOwner";
    pub const WORKFLOW_COMPLETE: &str = "Completed";
    pub const WORKFLOW_FAILED: &str = "Failed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// A recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerEvent {
    pub involved_object: ObjectReference,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Sink for controller events
pub trait EventRecorder: Send + Sync {
    fn record(&self, object: &ObjectReference, event_type: EventType, reason: &str, message: String);
}

/// Recorder that logs, broadcasts, and keeps a bounded history
#[derive(Debug)]
pub struct BroadcastRecorder {
    component: String,
    tx: broadcast::Sender<ControllerEvent>,
    recent: Mutex<VecDeque<ControllerEvent>>,
    capacity: usize,
}

impl BroadcastRecorder {
    pub fn new(component: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            component: component.into(),
            tx,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    /// Most recent events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<ControllerEvent> {
        let recent = self.recent.lock();
        let skip = recent.len().saturating_sub(limit);
        recent.iter().skip(skip).cloned().collect()
    }
}

impl EventRecorder for BroadcastRecorder {
    fn record(&self, object: &ObjectReference, event_type: EventType, reason: &str, message: String) {
        match event_type {
            EventType::Normal => tracing::info!(
                component = %self.component,
                object = %object.key(),
                reason,
                "{}",
                message
            ),
            EventType::Warning => tracing::warn!(
                component = %self.component,
                object = %object.key(),
                reason,
                "{}",
                message
            ),
        }

        let event = ControllerEvent {
            involved_object: object.clone(),
            event_type,
            reason: reason.to_string(),
            message,
            timestamp: Utc::now(),
        };

        {
            let mut recent = self.recent.lock();
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}
