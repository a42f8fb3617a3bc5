//! # Event sources: where resource lifecycle events come from.
//!
//! An [`EventSource`] turns a selection criterion into a lazy, live stream of
//! typed [`ResourceEvent`]s. Connecting, authenticating and decoding raw
//! notifications are the source's business; the supervisor only consumes
//! the stream.
//!
//! ## Stream contract
//! ```text
//! Some(Ok(event))  → deliver (at-least-once, possibly reordered)
//! Some(Err(e))     → connection broke; fatal to the run (not retried here)
//! None             → stream ended cleanly
//! ```
//! A stream is not restartable: once it ends, subscribe again (if the source allows).
//!
//! ## Implementations
//! - [`ChannelSource`]: scripted source fed through an [`EventSender`] (tests, demos).
//! - [`MemoryStore`]: in-memory resource store that is also a watchable source.

mod channel;
mod memory;

use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::resource::{LabelSelector, ResourceEvent};

pub use channel::{ChannelSource, EventSender};
pub use memory::MemoryStore;

/// Live sequence of resource events.
pub type EventStream = BoxStream<'static, Result<ResourceEvent, SourceError>>;

/// Producer of resource lifecycle events.
pub trait EventSource: Send + Sync + 'static {
    /// Opens a subscription for resources matching `selector`.
    fn subscribe(&self, selector: &LabelSelector) -> Result<EventStream, SourceError>;
}
