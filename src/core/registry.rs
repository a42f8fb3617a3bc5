//! # Worker registry: one live worker per resource key.
//!
//! The registry is the single authority for "is there a live worker for K".
//! It is owned by the event loop and mutated only from there, so it needs
//! no internal locking.
//!
//! ## Handle / lease split
//! ```text
//! WorkerHandle::new(key, parent) ──► (WorkerHandle, WorkerLease)
//!        │                                  │
//!        │ kept in registry                 │ moved into the worker task
//!        ├─ cancel()  ───── token ─────────►├─ token.cancelled()
//!        └─ completion() ◄── done ──────────┴─ dropped on task exit (any reason)
//! ```
//!
//! ## Rules
//! - `register` fails with `AlreadyRegistered` if the key is present
//! - `unregister` fails with `NotFound` if the key is absent
//! - an unregistered worker that has not exited yet stays *draining*; a new
//!   worker for the same key waits on its completion before running
//! - a registered worker that already exited is dropped by `reap`, so its key
//!   can be admitted again

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::RegistryError;
use crate::resource::ResourceKey;

/// Completion signal of one worker; fires once the worker task has exited.
#[derive(Clone, Debug)]
pub struct Completion {
    done: CancellationToken,
}

impl Completion {
    /// Waits until the worker has exited.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }
}

/// Registry-side view of a worker: cancellation trigger and completion signal.
#[derive(Debug)]
pub struct WorkerHandle {
    key: ResourceKey,
    task: Arc<str>,
    cancel: CancellationToken,
    done: CancellationToken,
}

/// Worker-side view of a worker: its own cancellation token and completion guard.
///
/// Dropping the lease marks the worker as exited.
pub struct WorkerLease {
    pub(crate) key: ResourceKey,
    pub(crate) task: Arc<str>,
    pub(crate) token: CancellationToken,
    _done: DropGuard,
}

impl WorkerHandle {
    /// Allocates a handle whose cancellation token is derived from `parent`.
    pub fn new(key: ResourceKey, parent: &CancellationToken) -> (Self, WorkerLease) {
        let task: Arc<str> = format!("worker/{key}").into();
        let cancel = parent.child_token();
        let done = CancellationToken::new();

        let lease = WorkerLease {
            key: key.clone(),
            task: task.clone(),
            token: cancel.clone(),
            _done: done.clone().drop_guard(),
        };
        let handle = Self {
            key,
            task,
            cancel,
            done,
        };
        (handle, lease)
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Task name used in events and errors (`worker/<ns>/<name>`).
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Triggers this worker's cancellation only.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn completion(&self) -> Completion {
        Completion {
            done: self.done.clone(),
        }
    }
}

impl WorkerLease {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Table of live workers keyed by resource.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<ResourceKey, WorkerHandle>,
    draining: HashMap<ResourceKey, Completion>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a worker is registered for `key`.
    pub fn has(&self, key: &ResourceKey) -> bool {
        self.workers.contains_key(key)
    }

    /// Adds a handle; fails if the key already has one.
    pub fn register(&mut self, handle: WorkerHandle) -> Result<(), RegistryError> {
        if self.workers.contains_key(handle.key()) {
            return Err(RegistryError::AlreadyRegistered {
                key: handle.key().clone(),
            });
        }
        self.workers.insert(handle.key().clone(), handle);
        Ok(())
    }

    /// Removes and returns the handle for `key`.
    ///
    /// The handle's completion is remembered until the worker exits.
    pub fn unregister(&mut self, key: &ResourceKey) -> Result<WorkerHandle, RegistryError> {
        let handle = self
            .workers
            .remove(key)
            .ok_or_else(|| RegistryError::NotFound { key: key.clone() })?;
        self.draining.retain(|_, c| !c.is_done());
        let completion = handle.completion();
        if !completion.is_done() {
            self.draining.insert(key.clone(), completion);
        }
        Ok(handle)
    }

    /// Removes entries whose worker has already exited; returns their keys.
    pub fn reap(&mut self) -> Vec<ResourceKey> {
        let mut exited = Vec::new();
        self.workers.retain(|key, handle| {
            let live = !handle.completion().is_done();
            if !live {
                exited.push(key.clone());
            }
            live
        });
        self.draining.retain(|_, c| !c.is_done());
        exited
    }

    /// Completion of a previous worker for `key` that was unregistered but
    /// has not exited yet.
    pub fn pending_exit(&mut self, key: &ResourceKey) -> Option<Completion> {
        self.draining.retain(|_, c| !c.is_done());
        self.draining.get(key).cloned()
    }

    /// Cancels and removes every registered worker.
    pub fn drain(&mut self) -> Vec<WorkerHandle> {
        let keys: Vec<ResourceKey> = self.workers.keys().cloned().collect();
        keys.into_iter()
            .filter_map(|key| self.unregister(&key).ok())
            .inspect(WorkerHandle::cancel)
            .collect()
    }

    /// Returns sorted list of registered keys.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.workers.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of unregistered workers still waiting to exit.
    pub fn draining_len(&self) -> usize {
        self.draining.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("default", name)
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let parent = CancellationToken::new();
        let mut reg = WorkerRegistry::new();

        let (h1, _l1) = WorkerHandle::new(key("a"), &parent);
        let (h2, _l2) = WorkerHandle::new(key("a"), &parent);
        reg.register(h1).unwrap();
        assert_eq!(
            reg.register(h2).unwrap_err(),
            RegistryError::AlreadyRegistered { key: key("a") }
        );
        assert!(reg.has(&key("a")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unregister_missing_key() {
        let mut reg = WorkerRegistry::new();
        assert_eq!(
            reg.unregister(&key("ghost")).unwrap_err(),
            RegistryError::NotFound { key: key("ghost") }
        );
    }

    #[test]
    fn test_cancel_is_per_key_but_parent_cancels_all() {
        let parent = CancellationToken::new();
        let mut reg = WorkerRegistry::new();
        let (ha, la) = WorkerHandle::new(key("a"), &parent);
        let (hb, lb) = WorkerHandle::new(key("b"), &parent);
        reg.register(ha).unwrap();
        reg.register(hb).unwrap();

        reg.unregister(&key("a")).unwrap().cancel();
        assert!(la.token().is_cancelled());
        assert!(!lb.token().is_cancelled());

        parent.cancel();
        assert!(lb.token().is_cancelled());
    }

    #[test]
    fn test_dropping_lease_completes_and_clears_draining() {
        let parent = CancellationToken::new();
        let mut reg = WorkerRegistry::new();
        let (h, lease) = WorkerHandle::new(key("a"), &parent);
        let completion = h.completion();
        reg.register(h).unwrap();

        reg.unregister(&key("a")).unwrap();
        assert!(reg.pending_exit(&key("a")).is_some());

        drop(lease);
        assert!(completion.is_done());
        assert!(reg.pending_exit(&key("a")).is_none());
    }

    #[test]
    fn test_drain_cancels_everything() {
        let parent = CancellationToken::new();
        let mut reg = WorkerRegistry::new();
        let mut leases = Vec::new();
        for name in ["b", "a", "c"] {
            let (h, l) = WorkerHandle::new(key(name), &parent);
            reg.register(h).unwrap();
            leases.push(l);
        }
        assert_eq!(reg.keys(), vec![key("a"), key("b"), key("c")]);

        let drained = reg.drain();
        assert_eq!(drained.len(), 3);
        assert!(reg.is_empty());
        assert!(leases.iter().all(|l| l.token().is_cancelled()));
    }

    #[test]
    fn test_unregister_forgets_exited_draining_workers() {
        let parent = CancellationToken::new();
        let mut reg = WorkerRegistry::new();
        let mut leases = Vec::new();
        for name in ["a", "b", "c"] {
            let (h, l) = WorkerHandle::new(key(name), &parent);
            reg.register(h).unwrap();
            leases.push(l);
        }

        reg.unregister(&key("a")).unwrap();
        reg.unregister(&key("b")).unwrap();
        assert_eq!(reg.draining_len(), 2);

        leases.clear();
        reg.unregister(&key("c")).unwrap();
        assert_eq!(reg.draining_len(), 0);
    }

    #[test]
    fn test_reap_drops_workers_that_exited_on_their_own() {
        let parent = CancellationToken::new();
        let mut reg = WorkerRegistry::new();
        let (ha, la) = WorkerHandle::new(key("a"), &parent);
        let (hb, _lb) = WorkerHandle::new(key("b"), &parent);
        reg.register(ha).unwrap();
        reg.register(hb).unwrap();

        drop(la);
        assert_eq!(reg.reap(), vec![key("a")]);
        assert!(!reg.has(&key("a")));
        assert!(reg.has(&key("b")));

        let (again, _l) = WorkerHandle::new(key("a"), &parent);
        assert!(reg.register(again).is_ok());
    }
}
