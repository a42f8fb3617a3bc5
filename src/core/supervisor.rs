//! # Supervisor: one watch run from subscription to terminal outcome.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the live-task
//! tracker and the user [`Workload`](crate::Workload). Each run subscribes to
//! an [`EventSource`], submits the [`EventLoop`] into a fresh [`TaskGroup`]
//! and turns the group outcome into the process exit contract.
//!
//! ## High-level architecture
//! ```text
//! run(source) / run_until(source, token)
//!   │
//!   ├─ subscriber_listener(): Bus ─► AliveTracker::update + SubscriberSet::emit
//!   ├─ source.subscribe(cfg.selector) ─► EventStream
//!   └─ TaskGroup(child of token)
//!        ├─ "event-loop"      EventLoop::run(stream)
//!        ├─ "worker/<key>"    WorkerTask::run()          (one per live key)
//!        └─ "reactive/<key>"  ReactiveTask::run()        (one per relevant update)
//!
//! drive(group):
//!   group.wait() finished first            → outcome.into_result()
//!   group cancelled (failure or caller)    → publish GroupCancelled
//!        └─ timeout(cfg.grace, group.wait())
//!             ├─ Ok(outcome)  → publish AllStoppedWithin → outcome.into_result()
//!             └─ Elapsed      → publish GraceExceeded
//!                               ├─ failure recorded → first failure
//!                               └─ otherwise        → RuntimeError::GraceExceeded{stuck}
//! ```
//!
//! ## Exit contract
//! - stream ended cleanly and every task finished → `Ok(())`
//! - cancelled by the caller (token / OS signal) within grace → `Ok(())`
//! - any task failure or source disconnect → exactly that first error
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use watchvisor::{ChannelSource, Config, LogWorkload, ResourceKey, ResourceSnapshot, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), watchvisor::RuntimeError> {
//!     let sup = Supervisor::builder(Config::default())
//!         .with_workload(Arc::new(LogWorkload))
//!         .build();
//!
//!     let (source, tx) = ChannelSource::new();
//!     tx.created(ResourceSnapshot::new(ResourceKey::new("default", "test-config")));
//!     drop(tx);
//!
//!     sup.run(&source).await
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        alive::AliveTracker,
        builder::SupervisorBuilder,
        config::Config,
        dispatch::{EVENT_LOOP_TASK, EventLoop},
        group::{GroupOutcome, TaskGroup},
        shutdown,
    },
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    source::EventSource,
    subscribers::SubscriberSet,
    tasks::WorkloadRef,
};

/// Runs watch sessions and enforces the shutdown grace.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    alive: Arc<AliveTracker>,
    workload: WorkloadRef,
    listening: AtomicBool,
    stop: CancellationToken,
}

impl Supervisor {
    /// Starts a [`SupervisorBuilder`].
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        workload: WorkloadRef,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            alive: Arc::new(AliveTracker::new()),
            workload,
            listening: AtomicBool::new(false),
            stop: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runtime event bus; subscribe for raw events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Names of tasks currently alive (eventually consistent).
    pub async fn alive_tasks(&self) -> Vec<String> {
        self.alive.snapshot().await
    }

    /// True if the named task (`worker/<ns>/<name>`, ...) is currently alive.
    pub async fn is_alive(&self, task: &str) -> bool {
        self.alive.is_alive(task).await
    }

    /// Watches `source` until its stream ends, a task fails, or a termination
    /// signal arrives (then shuts down within [`Config::grace`]).
    pub async fn run<S>(&self, source: &S) -> Result<(), RuntimeError>
    where
        S: EventSource + ?Sized,
    {
        let token = CancellationToken::new();
        let run = self.run_until(source, token.clone());
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => res,
            signal = shutdown::shutdown_signal() => {
                tracing::info!(signal, "shutdown requested");
                self.bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(signal));
                token.cancel();
                run.await
            }
        }
    }

    /// Like [`Supervisor::run`], but cancelled by `token` instead of OS signals.
    pub async fn run_until<S>(
        &self,
        source: &S,
        token: CancellationToken,
    ) -> Result<(), RuntimeError>
    where
        S: EventSource + ?Sized,
    {
        self.subscriber_listener();

        let stream = source
            .subscribe(&self.cfg.selector)
            .map_err(|source| RuntimeError::SourceDisconnected { source })?;

        let group = TaskGroup::new(&token);
        let event_loop = EventLoop::new(
            &self.cfg,
            group.clone(),
            Arc::clone(&self.workload),
            self.bus.clone(),
        );
        if group
            .submit(EVENT_LOOP_TASK, None, event_loop.run(stream))
            .is_err()
        {
            // Cancelled before the run started.
            return Ok(());
        }

        self.drive(&group).await
    }

    /// Subscribes to the bus once and forwards events to the tracker and subscribers.
    ///
    /// Ends when the supervisor is dropped; the subscriber workers follow once
    /// their queues close.
    fn subscriber_listener(&self) {
        if self.listening.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let alive = Arc::clone(&self.alive);
        let stop = self.stop.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    next = rx.recv() => next,
                };
                match next {
                    Ok(ev) => {
                        alive.update(&ev).await;
                        set.emit(&ev);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Waits for the group, applying the grace period once it is cancelled.
    async fn drive(&self, group: &TaskGroup) -> Result<(), RuntimeError> {
        let wait = group.wait();
        tokio::pin!(wait);

        tokio::select! {
            biased;
            _ = group.cancelled() => {}
            outcome = &mut wait => return outcome.into_result(),
        }

        let mut ev = Event::new(EventKind::GroupCancelled);
        ev = match group.failure() {
            Some(f) => ev.with_task(f.task).with_reason(f.error.to_string()),
            None => ev.with_reason("cancelled by caller"),
        };
        self.bus.publish(ev);

        let grace = self.cfg.grace;
        match time::timeout(grace, &mut wait).await {
            Ok(outcome) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                outcome.into_result()
            }
            Err(_elapsed) => {
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_timeout(grace));
                let stuck = self.alive.snapshot().await;
                match group.failure() {
                    Some(f) => {
                        tracing::warn!(?stuck, "grace exceeded after failure");
                        GroupOutcome::FirstFailure(f).into_result()
                    }
                    None => Err(RuntimeError::GraceExceeded { grace, stuck }),
                }
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
