//! # Subscriber trait.
//!
//! Implement [`Subscribe`] to observe the runtime: worker lifecycle, reactive
//! runs, ignored resource events and shutdown progress. Each subscriber gets
//! its own bounded queue and worker inside the
//! [`SubscriberSet`](crate::SubscriberSet), so a slow one never holds up the
//! supervisor or other subscribers; on overflow its events are dropped and a
//! `SubscriberOverflow` event is published.

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of runtime events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
