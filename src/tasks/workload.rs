//! # Workload: the work bound to a watched resource.
//!
//! A [`Workload`] supplies the two pieces of user logic the supervisor runs:
//! - [`Workload::on_tick`] — steady-state work, called on every worker tick
//!   while the resource exists;
//! - [`Workload::on_change`] — one-shot reactive work, called when the
//!   relevant field of the resource changed.
//!
//! Both run concurrently and independently for the same resource; they may
//! interleave arbitrarily.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use watchvisor::{ResourceSnapshot, TaskError, Workload};
//!
//! struct Render;
//!
//! #[async_trait]
//! impl Workload for Render {
//!     async fn on_change(&self, snapshot: &ResourceSnapshot, ctx: CancellationToken) -> Result<(), TaskError> {
//!         if ctx.is_cancelled() {
//!             return Err(TaskError::Canceled);
//!         }
//!         let _config = snapshot.field("config").unwrap_or_default();
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::resource::ResourceSnapshot;

/// User logic run by workers and one-shot reactive tasks.
#[async_trait]
pub trait Workload: Send + Sync + 'static {
    /// Steady-state unit of work, run once per tick.
    ///
    /// The future is dropped if the worker is cancelled mid-tick.
    /// An error moves the worker to `Failed` and cancels the whole group.
    /// `Err(TaskError::Canceled)` is only a clean stop after the worker was
    /// cancelled; returned on its own it is treated as fatal.
    async fn on_tick(&self, snapshot: &ResourceSnapshot, tick: u64) -> Result<(), TaskError> {
        let _ = (snapshot, tick);
        Ok(())
    }

    /// Processes a changed snapshot to completion.
    ///
    /// `ctx` is cancelled on group shutdown or timeout, and the future is
    /// dropped at that point. Use `ctx` to hand cancellation on to work
    /// spawned outside this future.
    async fn on_change(
        &self,
        snapshot: &ResourceSnapshot,
        ctx: CancellationToken,
    ) -> Result<(), TaskError>;
}

/// Shared handle to a workload.
pub type WorkloadRef = Arc<dyn Workload>;

/// Workload that only logs what it would do.
#[derive(Default, Debug)]
pub struct LogWorkload;

#[async_trait]
impl Workload for LogWorkload {
    async fn on_tick(&self, snapshot: &ResourceSnapshot, tick: u64) -> Result<(), TaskError> {
        tracing::info!(resource = %snapshot.key(), tick, "routine is running");
        Ok(())
    }

    async fn on_change(
        &self,
        snapshot: &ResourceSnapshot,
        _ctx: CancellationToken,
    ) -> Result<(), TaskError> {
        tracing::info!(
            resource = %snapshot.key(),
            config = snapshot.field("config").unwrap_or_default(),
            "processing work"
        );
        Ok(())
    }
}
