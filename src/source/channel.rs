use std::sync::{Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc;

use super::{EventSource, EventStream};
use crate::error::SourceError;
use crate::resource::{LabelSelector, ResourceEvent, ResourceKey, ResourceSnapshot};

type Item = Result<ResourceEvent, SourceError>;

/// Scripted event source backed by an unbounded channel.
///
/// Events are delivered exactly as sent (no selector filtering, no dedup),
/// which makes it suitable for replaying duplicate and out-of-order input.
/// Only one subscription is allowed.
pub struct ChannelSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Item>>>,
}

/// Sending half of a [`ChannelSource`]. Dropping every sender ends the stream cleanly.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Item>,
}

impl ChannelSource {
    pub fn new() -> (Self, EventSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            EventSender { tx },
        )
    }
}

impl EventSource for ChannelSource {
    fn subscribe(&self, _selector: &LabelSelector) -> Result<EventStream, SourceError> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| SourceError::Disconnected {
                reason: "channel source already subscribed".into(),
            })?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

impl EventSender {
    /// Sends one event. Returns `false` if the subscriber is gone.
    pub fn send(&self, event: ResourceEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    pub fn created(&self, snapshot: ResourceSnapshot) -> bool {
        self.send(ResourceEvent::Created(snapshot))
    }

    pub fn updated(&self, old: ResourceSnapshot, new: ResourceSnapshot) -> bool {
        self.send(ResourceEvent::Updated { old, new })
    }

    pub fn deleted(&self, key: ResourceKey) -> bool {
        self.send(ResourceEvent::Deleted(key))
    }

    /// Reports a broken connection to the subscriber.
    pub fn fail(&self, error: SourceError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_in_order_then_ends() {
        let (source, tx) = ChannelSource::new();
        let mut stream = source.subscribe(&LabelSelector::everything()).unwrap();

        let key = ResourceKey::new("default", "a");
        assert!(tx.created(ResourceSnapshot::new(key.clone())));
        assert!(tx.deleted(key.clone()));
        drop(tx);

        assert!(matches!(stream.next().await, Some(Ok(ResourceEvent::Created(_)))));
        assert!(matches!(stream.next().await, Some(Ok(ResourceEvent::Deleted(k))) if k == key));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_second_subscription_is_rejected() {
        let (source, _tx) = ChannelSource::new();
        let _first = source.subscribe(&LabelSelector::everything()).unwrap();
        assert!(matches!(
            source.subscribe(&LabelSelector::everything()),
            Err(SourceError::Disconnected { .. })
        ));
    }
}
