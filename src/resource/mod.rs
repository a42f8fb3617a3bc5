//! # Watched resources: identity, snapshots, lifecycle events, selection.
//!
//! - [`ResourceKey`] stable identity (`namespace/name`)
//! - [`ResourceSnapshot`] immutable view of a resource at one point in time
//! - [`ResourceEvent`] closed tagged variant delivered by an event source
//! - [`LabelSelector`] label-based selection criterion
//!
//! Events are decoded once at the source boundary; downstream code only
//! matches on the [`ResourceEvent`] tag and never re-inspects payload types.

mod event;
mod selector;
mod snapshot;

pub use event::ResourceEvent;
pub use selector::{LabelSelector, SelectorError};
pub use snapshot::{ResourceKey, ResourceSnapshot};
