//! # Runtime events emitted by the supervisor, its tasks and subscribers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker events**: long-running worker lifecycle (starting, stopped, failed)
//! - **Reactive events**: one-shot task lifecycle (starting, completed, failed, timeout)
//! - **Supervision events**: event-loop decisions and source state
//! - **Shutdown events**: group cancellation and grace handling
//!
//! The [`Event`] struct carries metadata such as timestamps, task name,
//! resource key and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use watchvisor::{Event, EventKind, ResourceKey};
//!
//! let ev = Event::new(EventKind::WorkerFailed)
//!     .with_task("worker/default/test-config")
//!     .with_key(ResourceKey::new("default", "test-config"))
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::WorkerFailed);
//! assert_eq!(ev.task.as_deref(), Some("worker/default/test-config"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::resource::ResourceKey;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Worker events ===
    /// Worker admitted and entering `Running`.
    ///
    /// Sets: `task`, `key`.
    WorkerStarting,

    /// Worker completed one tick of work.
    ///
    /// Sets: `task`, `key`, `tick` (1-based).
    WorkerTicked,

    /// Worker observed cancellation and exited (`Stopped`).
    ///
    /// Sets: `task`, `key`.
    WorkerStopped,

    /// Worker failed (`Failed`); the group is being cancelled.
    ///
    /// Sets: `task`, `key`, `reason`.
    WorkerFailed,

    /// Cancellation requested for a worker after `Deleted`.
    ///
    /// Sets: `task`, `key`.
    WorkerCancelRequested,

    // === Reactive (one-shot) events ===
    /// One-shot reactive task started.
    ///
    /// Sets: `task`, `key`.
    ReactiveStarting,

    /// One-shot reactive task finished (success or aborted by cancellation).
    ///
    /// Sets: `task`, `key`.
    ReactiveCompleted,

    /// One-shot reactive task failed.
    ///
    /// Sets: `task`, `key`, `reason`.
    ReactiveFailed,

    /// One-shot reactive task exceeded its timeout (always followed by `ReactiveFailed`).
    ///
    /// Sets: `task`, `key`, `timeout_ms`.
    TimeoutHit,

    // === Supervision events ===
    /// Resource event absorbed without action (duplicate, unknown key, unchanged).
    ///
    /// Sets: `key`, `reason` (ignore label).
    EventIgnored,

    /// Event source stream ended cleanly.
    SourceEnded,

    /// Event source stream broke.
    ///
    /// Sets: `reason`.
    SourceDisconnected,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// Group cancellation triggered (first failure or caller cancel).
    ///
    /// Sets: `task` (failing task, if any), `reason`.
    GroupCancelled,

    /// All tasks stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not stop in time.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Resource the event concerns, if applicable.
    pub key: Option<ResourceKey>,
    /// Human-readable reason (errors, ignore labels, overflow details).
    pub reason: Option<Arc<str>>,
    /// Reactive timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Worker tick counter (starting from 1).
    pub tick: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            key: None,
            reason: None,
            timeout_ms: None,
            tick: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a resource key.
    #[inline]
    pub fn with_key(mut self, key: ResourceKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a tick counter.
    #[inline]
    pub fn with_tick(mut self, n: u64) -> Self {
        self.tick = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::SourceEnded);
        let b = Event::new(EventKind::SourceEnded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_timeout_is_clamped_to_u32() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
