//! # One-shot reactive task.
//!
//! Processes a changed resource snapshot exactly once, with an optional
//! timeout, and publishes lifecycle events to [`Bus`].
//!
//! ## Event flow
//! ```text
//! Success:
//!   on_change() → Ok(())          → publish ReactiveCompleted
//!
//! Cancellation (group shutdown):
//!   ctx cancelled → on_change() dropped → Err(Canceled) → publish ReactiveCompleted
//!
//! Failure:
//!   on_change() → Err(Fail/Fatal) → publish ReactiveFailed
//!
//! Timeout:
//!   timeout exceeded → cancel ctx → publish TimeoutHit
//!                                 → publish ReactiveFailed (timeout)
//! ```
//!
//! ## Rules
//! - always publishes **exactly one** terminal event: `ReactiveCompleted` or `ReactiveFailed`
//! - `ctx` is a child of the group token; cancelling `ctx` does not affect the group
//! - an in-flight `on_change` is dropped once `ctx` fires, whether or not it observes `ctx`
//! - a reactive task is never tracked by the worker registry

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TaskError,
    events::{Bus, Event, EventKind},
    resource::{ResourceKey, ResourceSnapshot},
    tasks::WorkloadRef,
};

/// One-shot processing of a changed snapshot.
pub struct ReactiveTask {
    task: Arc<str>,
    snapshot: ResourceSnapshot,
    workload: WorkloadRef,
    timeout: Option<Duration>,
    bus: Bus,
}

impl ReactiveTask {
    pub fn new(snapshot: ResourceSnapshot, workload: WorkloadRef, bus: Bus) -> Self {
        Self {
            task: Self::name_for(snapshot.key()).into(),
            snapshot,
            workload,
            timeout: None,
            bus,
        }
    }

    /// Task name used in events and errors (`reactive/<ns>/<name>`).
    pub fn name_for(key: &ResourceKey) -> String {
        format!("reactive/{key}")
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn task(&self) -> &Arc<str> {
        &self.task
    }

    /// Runs once under a child of `parent`.
    pub async fn run(self, parent: CancellationToken) -> Result<(), TaskError> {
        let ctx = parent.child_token();
        self.publish(Event::new(EventKind::ReactiveStarting));

        let work = async {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(TaskError::Canceled),
                res = self.workload.on_change(&self.snapshot, ctx.clone()) => res,
            }
        };

        let res = match self.timeout {
            Some(dur) => match time::timeout(dur, work).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    ctx.cancel();
                    self.publish(Event::new(EventKind::TimeoutHit).with_timeout(dur));
                    Err(TaskError::Timeout { timeout: dur })
                }
            },
            None => work.await,
        };

        match res {
            Ok(()) | Err(TaskError::Canceled) => {
                self.publish(Event::new(EventKind::ReactiveCompleted));
                res
            }
            Err(e) => {
                self.publish(Event::new(EventKind::ReactiveFailed).with_reason(e.to_string()));
                Err(e)
            }
        }
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(
            ev.with_task(self.task.clone())
                .with_key(self.snapshot.key().clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Workload;
    use async_trait::async_trait;

    enum Behaviour {
        Succeed,
        Fail,
        Hang,
    }

    struct Scripted(Behaviour);

    #[async_trait]
    impl Workload for Scripted {
        async fn on_change(
            &self,
            _s: &ResourceSnapshot,
            ctx: CancellationToken,
        ) -> Result<(), TaskError> {
            match self.0 {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(TaskError::fail("render failed")),
                Behaviour::Hang => {
                    ctx.cancelled().await;
                    Err(TaskError::Canceled)
                }
            }
        }
    }

    fn reactive(b: Behaviour, bus: &Bus) -> ReactiveTask {
        let snapshot = ResourceSnapshot::new(ResourceKey::new("default", "a"));
        ReactiveTask::new(snapshot, Arc::new(Scripted(b)), bus.clone())
    }

    fn kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test]
    async fn test_success_publishes_completed() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = reactive(Behaviour::Succeed, &bus);
        assert_eq!(&**task.task(), "reactive/default/a");

        task.run(CancellationToken::new()).await.unwrap();
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::ReactiveStarting, EventKind::ReactiveCompleted]
        );
    }

    #[tokio::test]
    async fn test_failure_publishes_failed() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let err = reactive(Behaviour::Fail, &bus)
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::ReactiveStarting, EventKind::ReactiveFailed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_ctx_and_fails() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let parent = CancellationToken::new();
        let err = reactive(Behaviour::Hang, &bus)
            .with_timeout(Some(Duration::from_secs(2)))
            .run(parent.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Timeout { .. }));
        assert!(!parent.is_cancelled());
        assert_eq!(
            kinds(&mut rx),
            vec![
                EventKind::ReactiveStarting,
                EventKind::TimeoutHit,
                EventKind::ReactiveFailed
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_work_that_ignores_ctx() {
        struct Oblivious;

        #[async_trait]
        impl Workload for Oblivious {
            async fn on_change(
                &self,
                _s: &ResourceSnapshot,
                _ctx: CancellationToken,
            ) -> Result<(), TaskError> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let parent = CancellationToken::new();
        let snapshot = ResourceSnapshot::new(ResourceKey::new("default", "a"));
        let task = ReactiveTask::new(snapshot, Arc::new(Oblivious), bus.clone());
        let join = tokio::spawn(task.run(parent.clone()));

        time::sleep(Duration::from_secs(60)).await;
        assert!(!join.is_finished());
        parent.cancel();

        assert!(matches!(join.await.unwrap(), Err(TaskError::Canceled)));
        assert_eq!(
            kinds(&mut rx),
            vec![EventKind::ReactiveStarting, EventKind::ReactiveCompleted]
        );
    }

    #[tokio::test]
    async fn test_group_cancellation_aborts_without_failure() {
        let bus = Bus::new(16);
        let parent = CancellationToken::new();
        parent.cancel();
        let res = reactive(Behaviour::Hang, &bus).run(parent).await;
        assert!(matches!(res, Err(TaskError::Canceled)));
    }
}
