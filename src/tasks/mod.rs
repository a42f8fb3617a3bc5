//! # User work abstractions.
//!
//! - [`Workload`] - trait implemented by users: per-tick and per-change work
//! - [`WorkloadRef`] - shared reference to a workload (`Arc<dyn Workload>`)
//! - [`LogWorkload`] - logging-only workload (default)

mod workload;

pub use workload::{LogWorkload, Workload, WorkloadRef};
