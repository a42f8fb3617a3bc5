//! # Runtime event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel. Workers, reactive
//! tasks, the event loop and the supervisor publish into it; the supervisor's
//! listener (and any direct receiver, e.g. tests) consume from it.
//!
//! ```text
//!   WorkerTask   ──┐
//!   ReactiveTask ──┼──► Bus ──► subscriber_listener ──► AliveTracker
//!   EventLoop    ──┤                               └──► SubscriberSet
//!   Supervisor   ──┘
//! ```
//!
//! ## Rules
//! - `publish` never blocks and never fails; with no receivers the event is dropped
//! - one ring buffer of `capacity` events is shared by all receivers
//! - a slow receiver gets `RecvError::Lagged(n)` and loses the `n` oldest events

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the runtime event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` undelivered events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        // No receivers is not an error for observability events.
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
