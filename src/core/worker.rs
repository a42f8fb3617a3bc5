//! # WorkerTask: long-running work bound to one resource.
//!
//! ## State machine
//! ```text
//!            ┌──────────── cancellation observed ────────────► Stopped  → Ok(())
//! Running ───┤
//!            └──────────── on_tick() returned Err ───────────► Failed   → Err(e)
//! ```
//!
//! ## Loop
//! ```text
//! [wait for previous worker of the same key to exit]   (re-admission only)
//! publish WorkerStarting
//! loop {
//!   ├─► select(biased) { cancelled → Stopped, tick elapsed → continue }
//!   └─► select(biased) { cancelled → Stopped, on_tick() → Ok: WorkerTicked / Err: Failed }
//! }
//! ```
//!
//! ## Rules
//! - cancellation is checked before every tick; latency is bounded by one tick interval
//! - the worker reads its own token only and never touches the registry
//! - the lease is dropped on exit (any reason), firing the handle's completion signal
//! - `Err(Canceled)` from `on_tick` counts as a stop only if the token fired;
//!   otherwise the worker fails with `TaskError::Fatal`

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::{
    core::registry::{Completion, WorkerLease},
    error::TaskError,
    events::{Bus, Event, EventKind},
    resource::ResourceSnapshot,
    tasks::WorkloadRef,
};

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopped,
    Failed,
}

/// Long-running worker for one resource key.
pub struct WorkerTask {
    lease: WorkerLease,
    snapshot: ResourceSnapshot,
    workload: WorkloadRef,
    tick: Duration,
    bus: Bus,
    previous: Option<Completion>,
}

impl WorkerTask {
    pub fn new(
        lease: WorkerLease,
        snapshot: ResourceSnapshot,
        workload: WorkloadRef,
        tick: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            lease,
            snapshot,
            workload,
            tick,
            bus,
            previous: None,
        }
    }

    /// Delays `Running` until a previous worker for the same key has exited.
    pub fn after(mut self, previous: Option<Completion>) -> Self {
        self.previous = previous;
        self
    }

    /// Runs until cancellation (`Ok`) or the first tick failure (`Err`).
    pub async fn run(self) -> Result<(), TaskError> {
        let token = self.lease.token.clone();

        if let Some(prev) = &self.previous {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                _ = prev.wait() => {}
            }
        }

        self.publish(Event::new(EventKind::WorkerStarting));
        let mut ticks = time::interval_at(time::Instant::now() + self.tick, self.tick);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        let (state, result) = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break (WorkerState::Stopped, Ok(())),
                _ = ticks.tick() => {}
            }

            tick += 1;
            let res = tokio::select! {
                biased;
                _ = token.cancelled() => break (WorkerState::Stopped, Ok(())),
                res = self.workload.on_tick(&self.snapshot, tick) => res,
            };

            match res {
                Ok(()) => self.publish(Event::new(EventKind::WorkerTicked).with_tick(tick)),
                Err(TaskError::Canceled) if token.is_cancelled() => {
                    break (WorkerState::Stopped, Ok(()));
                }
                // Only the registry may end a worker; a self-exit would leave its key behind.
                Err(TaskError::Canceled) => {
                    break (
                        WorkerState::Failed,
                        Err(TaskError::Fatal {
                            error: "worker exited without cancellation".into(),
                        }),
                    );
                }
                Err(e) => break (WorkerState::Failed, Err(e)),
            }
        };

        match (&state, &result) {
            (WorkerState::Failed, Err(e)) => {
                self.publish(Event::new(EventKind::WorkerFailed).with_reason(e.to_string()))
            }
            _ => self.publish(Event::new(EventKind::WorkerStopped)),
        }
        result
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(
            ev.with_task(self.lease.task.clone())
                .with_key(self.lease.key.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::WorkerHandle;
    use crate::resource::ResourceKey;
    use crate::tasks::Workload;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio_util::sync::CancellationToken;

    const TICK: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct Counting {
        ticks: AtomicU64,
        fail_at: Option<u64>,
        quit_at: Option<u64>,
    }

    #[async_trait]
    impl Workload for Counting {
        async fn on_tick(&self, _s: &ResourceSnapshot, tick: u64) -> Result<(), TaskError> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(tick) {
                return Err(TaskError::fail("tick failed"));
            }
            if self.quit_at == Some(tick) {
                return Err(TaskError::Canceled);
            }
            Ok(())
        }

        async fn on_change(
            &self,
            _s: &ResourceSnapshot,
            _ctx: CancellationToken,
        ) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn worker(workload: Arc<Counting>, parent: &CancellationToken) -> (WorkerHandle, WorkerTask) {
        let key = ResourceKey::new("default", "a");
        let (handle, lease) = WorkerHandle::new(key.clone(), parent);
        let task = WorkerTask::new(
            lease,
            ResourceSnapshot::new(key),
            workload,
            TICK,
            Bus::new(64),
        );
        (handle, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_within_one_tick_of_cancellation() {
        let workload = Arc::new(Counting::default());
        let (handle, task) = worker(workload.clone(), &CancellationToken::new());
        let completion = handle.completion();
        let join = tokio::spawn(task.run());

        time::sleep(TICK * 3 + TICK / 2).await;
        assert_eq!(workload.ticks.load(Ordering::SeqCst), 3);

        let cancelled_at = time::Instant::now();
        handle.cancel();
        join.await.unwrap().unwrap();
        assert!(cancelled_at.elapsed() <= TICK);
        assert!(completion.is_done());
        assert_eq!(workload.ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_failure_moves_to_failed() {
        let workload = Arc::new(Counting {
            fail_at: Some(2),
            ..Default::default()
        });
        let (handle, task) = worker(workload.clone(), &CancellationToken::new());

        let err = task.run().await.unwrap_err();
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(workload.ticks.load(Ordering::SeqCst), 2);
        assert!(handle.completion().is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceled_without_token_is_fatal() {
        let workload = Arc::new(Counting {
            quit_at: Some(1),
            ..Default::default()
        });
        let (handle, task) = worker(workload, &CancellationToken::new());

        let err = task.run().await.unwrap_err();
        assert_eq!(err.as_label(), "task_fatal");
        assert!(!handle.is_cancelled());
        assert!(handle.completion().is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_previous_worker_before_running() {
        let parent = CancellationToken::new();
        let workload = Arc::new(Counting::default());
        let (old_handle, old_task) = worker(workload.clone(), &parent);
        let (new_handle, new_task) = worker(workload.clone(), &parent);
        let new_task = new_task.after(Some(old_handle.completion()));

        // Old worker is never started: its lease is still alive inside `old_task`.
        let join = tokio::spawn(new_task.run());
        time::sleep(TICK * 2 + TICK / 2).await;
        assert_eq!(workload.ticks.load(Ordering::SeqCst), 0);

        drop(old_task);
        time::sleep(TICK + TICK / 2).await;
        assert_eq!(workload.ticks.load(Ordering::SeqCst), 1);

        new_handle.cancel();
        join.await.unwrap().unwrap();
    }
}
