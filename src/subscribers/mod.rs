//! # Event subscribers for the watchvisor runtime.
//!
//! ```text
//!   Worker / Reactive / EventLoop ── publish(Event) ──► Bus
//!                                                        │
//!                                     Supervisor listener┤
//!                                                        ├──► AliveTracker (live task set)
//!                                                        └──► SubscriberSet
//!                                                               ├──► LogWriter
//!                                                               └──► custom Subscribe impls
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
