//! # In-memory resource store.
//!
//! [`MemoryStore`] keeps namespaced [`ResourceSnapshot`]s and doubles as an
//! [`EventSource`]: every write is turned into lifecycle events for each
//! subscriber, as seen through that subscriber's selector.
//!
//! ## Event derivation per subscriber
//! ```text
//! matched before │ matched after │ delivered
//! ───────────────┼───────────────┼─────────────────────
//!      no        │     yes       │ Created(new)
//!      yes       │     yes       │ Updated{old, new}
//!      yes       │     no        │ Deleted(key)
//!      no        │     no        │ nothing
//! ```
//! A new subscription first receives `Created` for every matching resource
//! already stored (initial list), then live events.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc;

use super::{EventSource, EventStream};
use crate::error::{SourceError, StoreError};
use crate::resource::{LabelSelector, ResourceEvent, ResourceKey, ResourceSnapshot};

type Item = Result<ResourceEvent, SourceError>;

struct Watcher {
    selector: LabelSelector,
    tx: mpsc::UnboundedSender<Item>,
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<ResourceKey, ResourceSnapshot>,
    watchers: Vec<Watcher>,
    revision: u64,
    closed: bool,
}

impl StoreState {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Fans one transition out to every watcher; drops watchers that went away.
    fn notify(&mut self, old: Option<&ResourceSnapshot>, new: Option<&ResourceSnapshot>) {
        self.watchers.retain(|w| {
            let was = old.is_some_and(|o| w.selector.matches(o.labels()));
            let is = new.is_some_and(|n| w.selector.matches(n.labels()));
            let event = match (old, new, was, is) {
                (_, Some(n), false, true) => ResourceEvent::Created(n.clone()),
                (Some(o), Some(n), true, true) => ResourceEvent::Updated {
                    old: o.clone(),
                    new: n.clone(),
                },
                (Some(o), _, true, false) => ResourceEvent::Deleted(o.key().clone()),
                _ => return true,
            };
            w.tx.send(Ok(event)).is_ok()
        });
    }
}

/// Thread-safe in-memory resource store and event source.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        let state = self.state();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    /// Fetches a resource by key.
    pub fn get(&self, key: &ResourceKey) -> Result<ResourceSnapshot, StoreError> {
        self.state()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    /// Lists resources matching `selector`, ordered by key.
    pub fn list(&self, selector: &LabelSelector) -> Vec<ResourceSnapshot> {
        self.state()
            .objects
            .values()
            .filter(|s| selector.matches(s.labels()))
            .cloned()
            .collect()
    }

    /// Creates a resource; fails if the key is taken.
    pub fn create(&self, snapshot: ResourceSnapshot) -> Result<ResourceSnapshot, StoreError> {
        let mut state = self.open_state()?;
        if state.objects.contains_key(snapshot.key()) {
            return Err(StoreError::AlreadyExists {
                key: snapshot.key().clone(),
            });
        }
        Ok(Self::insert(&mut state, snapshot, None))
    }

    /// Creates a resource unless one with the same key exists; returns the stored one.
    pub fn create_if_absent(
        &self,
        snapshot: ResourceSnapshot,
    ) -> Result<ResourceSnapshot, StoreError> {
        let mut state = self.open_state()?;
        if let Some(existing) = state.objects.get(snapshot.key()) {
            return Ok(existing.clone());
        }
        Ok(Self::insert(&mut state, snapshot, None))
    }

    /// Creates or replaces a resource.
    pub fn apply(&self, snapshot: ResourceSnapshot) -> Result<ResourceSnapshot, StoreError> {
        let mut state = self.open_state()?;
        let old = state.objects.get(snapshot.key()).cloned();
        Ok(Self::insert(&mut state, snapshot, old))
    }

    /// Deletes a resource by key and returns its last snapshot.
    pub fn delete(&self, key: &ResourceKey) -> Result<ResourceSnapshot, StoreError> {
        let mut state = self.open_state()?;
        let removed = state
            .objects
            .remove(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        state.next_revision();
        state.notify(Some(&removed), None);
        Ok(removed)
    }

    /// Ends every subscription cleanly and rejects further writes.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.watchers.clear();
    }

    /// Ends every subscription with [`SourceError::Disconnected`].
    ///
    /// The store stays writable; new subscriptions are accepted.
    pub fn disconnect(&self, reason: &str) {
        let watchers = std::mem::take(&mut self.state().watchers);
        for w in watchers {
            let _ = w.tx.send(Err(SourceError::Disconnected {
                reason: reason.to_string(),
            }));
        }
    }

    fn insert(
        state: &mut StoreState,
        snapshot: ResourceSnapshot,
        old: Option<ResourceSnapshot>,
    ) -> ResourceSnapshot {
        let revision = state.next_revision();
        let mut stored = snapshot.with_revision(revision);
        if let Some(old) = &old {
            stored = stored.with_created_at(old.created_at());
        }
        state.objects.insert(stored.key().clone(), stored.clone());
        state.notify(old.as_ref(), Some(&stored));
        stored
    }
}

impl EventSource for MemoryStore {
    fn subscribe(&self, selector: &LabelSelector) -> Result<EventStream, SourceError> {
        let mut state = self.state();
        if state.closed {
            return Err(SourceError::Disconnected {
                reason: "store closed".into(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for snapshot in state.objects.values() {
            if selector.matches(snapshot.labels()) {
                let _ = tx.send(Ok(ResourceEvent::Created(snapshot.clone())));
            }
        }
        state.watchers.push(Watcher {
            selector: selector.clone(),
            tx,
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}
