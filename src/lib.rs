//! # watchvisor
//!
//! **Watchvisor** keeps exactly one supervised background worker alive for
//! every watched resource that currently exists, bound to that resource's
//! lifetime, and runs one-shot reactive work whenever a resource's relevant
//! content changes. Any failure cancels the whole run (fail-fast) and is
//! reported as the single terminal error.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   EventSource (MemoryStore, ChannelSource, custom)
//!        │  Created / Updated / Deleted
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Bus (broadcast runtime events)                                 │
//! │  - AliveTracker (live tasks, sequence-ordered)                    │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │                                                                   │
//! │  TaskGroup (first failure wins, shared cancellation)              │
//! │   ├─ EventLoop ── owns ──► WorkerRegistry (key → WorkerHandle)    │
//! │   ├─ WorkerTask  worker/<ns>/<name>    (one per live key)         │
//! │   └─ ReactiveTask reactive/<ns>/<name> (one per relevant update)  │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                    (capacity: Config::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                    AliveTracker     SubscriberSet ──► LogWriter, custom
//! ```
//!
//! ### Lifecycle of one key
//! ```text
//! Created(K)         ──► register handle ──► WorkerTask Running (ticks every Config::tick)
//! Updated(K, a, b)   ──► relevant field changed? ──► ReactiveTask (one-shot)
//! Deleted(K)         ──► cancel handle, unregister ──► worker Stopped within one tick
//! on_tick() error    ──► worker Failed ──► group cancelled ──► run returns that error
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                            |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------------|
//! | **Supervision**   | Watch a source and run workers bound to resources.            | [`Supervisor`], [`SupervisorBuilder`]         |
//! | **Work**          | User logic per tick and per relevant change.                  | [`Workload`], [`LogWorkload`]                 |
//! | **Sources**       | Where events come from.                                       | [`EventSource`], [`MemoryStore`], [`ChannelSource`] |
//! | **Building blocks**| Registry and group usable on their own.                      | [`WorkerRegistry`], [`TaskGroup`]             |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).          | [`Subscribe`], [`LogWriter`]                  |
//! | **Errors**        | Typed errors correlated to their originating task and key.    | [`RuntimeError`], [`TaskError`]               |
//! | **Configuration** | Centralize runtime settings.                                  | [`Config`]                                    |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use watchvisor::{Config, LogWorkload, MemoryStore, ResourceKey, ResourceSnapshot, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), watchvisor::RuntimeError> {
//!     let cfg = Config {
//!         tick: Duration::from_millis(50),
//!         ..Config::default()
//!     };
//!     let sup = Supervisor::builder(cfg).with_workload(Arc::new(LogWorkload)).build();
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let key = ResourceKey::new("default", "test-config");
//!     store
//!         .create_if_absent(ResourceSnapshot::new(key.clone()).with_data("config", "v1"))
//!         .expect("store open");
//!
//!     let writer = Arc::clone(&store);
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(120)).await;
//!         writer.delete(&key).expect("exists");
//!         writer.close();
//!     });
//!
//!     sup.run(store.as_ref()).await
//! }
//! ```

mod core;
mod error;
mod events;
mod resource;
mod source;
mod subscribers;
mod tasks;

pub mod logging;

// ---- Public re-exports ----

pub use core::{
    Completion, Config, Dispatch, EVENT_LOOP_TASK, EventLoop, GroupFailure, GroupOutcome,
    IgnoreReason, ReactiveTask, Supervisor, SupervisorBuilder, TaskGroup, UnknownUpdate,
    WorkerHandle, WorkerLease, WorkerRegistry, WorkerState, WorkerTask,
};
pub use error::{RegistryError, RuntimeError, SourceError, StoreError, SubmitError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use resource::{LabelSelector, ResourceEvent, ResourceKey, ResourceSnapshot, SelectorError};
pub use source::{ChannelSource, EventSender, EventSource, EventStream, MemoryStore};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{LogWorkload, Workload, WorkloadRef};
