//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`] — distributes events to multiple subscribers
//! concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber panics while holding a lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
                        let info = crate::core::panic_message(panic_err.as_ref());
                        bus_for_worker.publish(Event::subscriber_panicked(sub.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits an event to all subscribers (non-blocking).
    ///
    /// Overflow events are not re-reported when they overflow themselves.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        let is_overflow_evt = event.is_subscriber_event();

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Gracefully shuts down all subscriber workers: close queues, await workers.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
