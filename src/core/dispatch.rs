//! # Event loop: translates resource events into registry and group actions.
//!
//! The [`EventLoop`] is the single consumer of the event stream and the
//! single writer to the [`WorkerRegistry`]. It runs as one task inside the
//! [`TaskGroup`] like every other unit of work.
//!
//! ## Policy
//! ```text
//! Created(K, snap)      registry has K?   yes → ignore (duplicate)
//!                                         no  → register handle, submit WorkerTask
//! Updated(K, old, new)  relevant field equal?        → ignore (unchanged)
//!                       no worker for K and Ignore?  → ignore (unknown key)
//!                       otherwise                    → submit one-shot ReactiveTask
//! Deleted(K)            registry has K?   no  → ignore (unknown / duplicate)
//!                                         yes → cancel handle, unregister K
//! ```
//!
//! ## Stream end
//! ```text
//! Some(Err(e)) → Err(TaskError::Source(e))   (fails the group)
//! None         → close group, cancel workers  → Ok(())
//! cancelled    → cancel workers               → Err(Canceled)
//! ```
//!
//! ## Rules
//! - every event yields zero or one registry mutation and zero or one submission
//! - entries of workers that already exited are reaped before each event
//! - ignored events never reach the group; they are logged at debug and published as `EventIgnored`
//! - the loop never awaits a worker's exit; the group does

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::{
    core::{
        config::{Config, UnknownUpdate},
        group::TaskGroup,
        reactive::ReactiveTask,
        registry::{WorkerHandle, WorkerRegistry},
        worker::WorkerTask,
    },
    error::{SubmitError, TaskError},
    events::{Bus, Event, EventKind},
    resource::{ResourceEvent, ResourceKey, ResourceSnapshot},
    source::EventStream,
    tasks::WorkloadRef,
};

/// Task name of the event loop inside the group.
pub const EVENT_LOOP_TASK: &str = "event-loop";

/// Why an event was absorbed without action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `Created` for a key that already has a live worker.
    DuplicateCreate,
    /// `Deleted` for a key with no worker.
    UnknownDelete,
    /// `Updated` whose relevant field did not change.
    UnchangedUpdate,
    /// `Updated` for a key with no worker (under [`UnknownUpdate::Ignore`]).
    UnknownKeyOnUpdate,
}

impl IgnoreReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            IgnoreReason::DuplicateCreate => "duplicate_create",
            IgnoreReason::UnknownDelete => "unknown_delete",
            IgnoreReason::UnchangedUpdate => "unchanged_update",
            IgnoreReason::UnknownKeyOnUpdate => "unknown_key_on_update",
        }
    }
}

/// What the event loop did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    SpawnedWorker,
    SpawnedReactive,
    CancelledWorker,
    Ignored(IgnoreReason),
}

/// Single-writer owner of the worker registry.
pub struct EventLoop {
    registry: WorkerRegistry,
    group: TaskGroup,
    workload: WorkloadRef,
    bus: Bus,
    tick: Duration,
    reactive_timeout: Option<Duration>,
    relevant_field: Arc<str>,
    unknown_update: UnknownUpdate,
}

impl EventLoop {
    pub fn new(cfg: &Config, group: TaskGroup, workload: WorkloadRef, bus: Bus) -> Self {
        Self {
            registry: WorkerRegistry::new(),
            group,
            workload,
            bus,
            tick: cfg.tick_interval(),
            reactive_timeout: cfg.reactive_timeout(),
            relevant_field: cfg.relevant_field.as_str().into(),
            unknown_update: cfg.unknown_update,
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Consumes `stream` until it ends, breaks, or the group is cancelled.
    pub async fn run(mut self, mut stream: EventStream) -> Result<(), TaskError> {
        let token = self.group.token().clone();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.cancel_all();
                    return Err(TaskError::Canceled);
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    if self.handle(event).is_err() {
                        self.cancel_all();
                        return Err(TaskError::Canceled);
                    }
                }
                Some(Err(e)) => {
                    self.bus.publish(
                        Event::new(EventKind::SourceDisconnected)
                            .with_task(EVENT_LOOP_TASK)
                            .with_reason(e.to_string()),
                    );
                    return Err(TaskError::Source(e));
                }
                None => {
                    self.bus
                        .publish(Event::new(EventKind::SourceEnded).with_task(EVENT_LOOP_TASK));
                    self.group.close();
                    self.cancel_all();
                    return Ok(());
                }
            }
        }
    }

    /// Applies the policy to one event.
    ///
    /// Fails only when the group no longer accepts submissions.
    pub fn handle(&mut self, event: ResourceEvent) -> Result<Dispatch, SubmitError> {
        for exited in self.registry.reap() {
            tracing::debug!(resource = %exited, "worker already exited; entry dropped");
        }

        let key = event.key().clone();
        let dispatch = match event {
            ResourceEvent::Created(snapshot) => self.on_created(snapshot)?,
            ResourceEvent::Updated { old, new } => self.on_updated(&old, new)?,
            ResourceEvent::Deleted(key) => self.on_deleted(&key),
        };

        if let Dispatch::Ignored(reason) = dispatch {
            tracing::debug!(resource = %key, reason = reason.as_label(), "event ignored");
            self.bus.publish(
                Event::new(EventKind::EventIgnored)
                    .with_key(key)
                    .with_reason(reason.as_label()),
            );
        }
        Ok(dispatch)
    }

    fn on_created(&mut self, snapshot: ResourceSnapshot) -> Result<Dispatch, SubmitError> {
        let key = snapshot.key().clone();
        if self.registry.has(&key) {
            return Ok(Dispatch::Ignored(IgnoreReason::DuplicateCreate));
        }

        let previous = self.registry.pending_exit(&key);
        let (handle, lease) = WorkerHandle::new(key.clone(), self.group.token());
        let task: Arc<str> = handle.task().into();
        if self.registry.register(handle).is_err() {
            return Ok(Dispatch::Ignored(IgnoreReason::DuplicateCreate));
        }

        let worker = WorkerTask::new(
            lease,
            snapshot,
            Arc::clone(&self.workload),
            self.tick,
            self.bus.clone(),
        )
        .after(previous);

        // A rejected worker drops its lease, so the key is not left draining.
        if let Err(e) = self.group.submit(task, Some(key.clone()), worker.run()) {
            let _ = self.registry.unregister(&key);
            return Err(e);
        }
        Ok(Dispatch::SpawnedWorker)
    }

    fn on_updated(
        &mut self,
        old: &ResourceSnapshot,
        new: ResourceSnapshot,
    ) -> Result<Dispatch, SubmitError> {
        if old.relevant_eq(&new, &self.relevant_field) {
            return Ok(Dispatch::Ignored(IgnoreReason::UnchangedUpdate));
        }
        if self.unknown_update == UnknownUpdate::Ignore && !self.registry.has(new.key()) {
            return Ok(Dispatch::Ignored(IgnoreReason::UnknownKeyOnUpdate));
        }

        let key = new.key().clone();
        let reactive = ReactiveTask::new(new, Arc::clone(&self.workload), self.bus.clone())
            .with_timeout(self.reactive_timeout);
        let task = Arc::clone(reactive.task());
        self.group
            .submit(task, Some(key), reactive.run(self.group.token().clone()))?;
        Ok(Dispatch::SpawnedReactive)
    }

    fn on_deleted(&mut self, key: &ResourceKey) -> Dispatch {
        match self.registry.unregister(key) {
            Ok(handle) => {
                handle.cancel();
                self.publish_cancel(&handle);
                Dispatch::CancelledWorker
            }
            Err(_) => Dispatch::Ignored(IgnoreReason::UnknownDelete),
        }
    }

    /// Cancels every registered worker; used when the loop exits.
    fn cancel_all(&mut self) {
        for handle in self.registry.drain() {
            self.publish_cancel(&handle);
        }
    }

    fn publish_cancel(&self, handle: &WorkerHandle) {
        self.bus.publish(
            Event::new(EventKind::WorkerCancelRequested)
                .with_task(handle.task())
                .with_key(handle.key().clone()),
        );
    }
}
