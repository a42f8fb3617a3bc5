//! # LogWriter — runtime events rendered through `tracing`
//!
//! ## Example output
//! ```text
//! INFO  worker starting task="worker/default/test-config"
//! DEBUG worker tick task="worker/default/test-config" tick=3
//! WARN  reactive task failed task="reactive/default/test-config" reason="execution failed: boom"
//! INFO  worker stopped task="worker/default/test-config"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let key = e.key.as_ref().map(ToString::to_string);
        let key = key.as_deref();

        match e.kind {
            EventKind::WorkerStarting => tracing::info!(task, "worker starting"),
            EventKind::WorkerTicked => tracing::debug!(task, tick = e.tick, "worker tick"),
            EventKind::WorkerStopped => tracing::info!(task, "worker stopped"),
            EventKind::WorkerFailed => tracing::error!(task, reason, "worker failed"),
            EventKind::WorkerCancelRequested => {
                tracing::info!(task, "removing worker capacity")
            }
            EventKind::ReactiveStarting => tracing::info!(task, "processing change"),
            EventKind::ReactiveCompleted => tracing::info!(task, "change processed"),
            EventKind::ReactiveFailed => tracing::warn!(task, reason, "reactive task failed"),
            EventKind::TimeoutHit => {
                tracing::warn!(task, timeout_ms = e.timeout_ms, "reactive task timed out")
            }
            EventKind::EventIgnored => tracing::debug!(key, reason, "event ignored"),
            EventKind::SourceEnded => tracing::info!("event source ended"),
            EventKind::SourceDisconnected => {
                tracing::error!(reason, "event source disconnected")
            }
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::GroupCancelled => tracing::warn!(task, reason, "task group cancelled"),
            EventKind::AllStoppedWithin => tracing::info!("all tasks stopped within grace"),
            EventKind::GraceExceeded => tracing::error!("grace period exceeded"),
            EventKind::SubscriberOverflow => tracing::warn!(task, reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => tracing::error!(task, reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
