//! Runtime core: supervision and lifecycle.
//!
//! Internal modules:
//! - [`registry`]: one live worker per resource key (handle / lease split);
//! - [`group`]: task group with first-failure-wins and shared cancellation;
//! - [`worker`]: long-running worker ticking until cancelled or failed;
//! - [`reactive`]: one-shot work on relevant changes, optional timeout;
//! - [`dispatch`]: event loop applying the Created / Updated / Deleted policy;
//! - [`supervisor`]: wires everything, handles signals and the shutdown grace;
//! - [`alive`]: live-task tracking for stuck-task reports;
//! - [`shutdown`]: cross-platform termination signals.

mod alive;
mod builder;
mod config;
mod dispatch;
mod group;
mod reactive;
mod registry;
mod shutdown;
mod supervisor;
mod worker;

use std::any::Any;

pub use builder::SupervisorBuilder;
pub use config::{Config, UnknownUpdate};
pub use dispatch::{Dispatch, EVENT_LOOP_TASK, EventLoop, IgnoreReason};
pub use group::{GroupFailure, GroupOutcome, TaskGroup};
pub use reactive::ReactiveTask;
pub use registry::{Completion, WorkerHandle, WorkerLease, WorkerRegistry};
pub use supervisor::Supervisor;
pub use worker::{WorkerState, WorkerTask};

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
