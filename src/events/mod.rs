//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the supervisor, event loop,
//! workers, one-shot tasks and subscriber workers.
//!
//! Not to be confused with [`ResourceEvent`](crate::ResourceEvent), which is
//! the *input* of the supervisor; these are its *output*.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
