//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for a supervisor run.
//!
//! ## Sentinel values
//! - `reactive_timeout = 0s` → no timeout for one-shot reactive tasks
//! - `tick = 0s` → clamped to 1ms (a worker must tick to observe cancellation)

use std::time::Duration;

use crate::resource::LabelSelector;

/// What to do with `Updated(K, ..)` when no worker is registered for `K`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownUpdate {
    /// Ignore it: no worker implies no reaction (default).
    #[default]
    Ignore,
    /// Run the one-shot reactive task anyway.
    React,
}

/// Global configuration for a supervisor run.
///
/// ## Field semantics
/// - `tick`: worker tick interval; also the worker's cancellation latency bound
/// - `grace`: maximum wait for tasks to exit once the group is cancelled
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `reactive_timeout`: per one-shot task timeout (`0s` = none)
/// - `relevant_field`: snapshot data field compared on `Updated`
/// - `unknown_update`: policy for updates on keys without a worker
/// - `selector`: label selector passed to the event source
#[derive(Clone, Debug)]
pub struct Config {
    /// Interval between worker ticks.
    pub tick: Duration,

    /// Maximum time to wait for tasks to stop after group cancellation.
    ///
    /// If exceeded on a caller-initiated shutdown, the run returns
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Timeout applied to every one-shot reactive task.
    pub reactive_timeout: Duration,

    /// Data field whose change triggers reactive work.
    pub relevant_field: String,

    /// Policy for `Updated` events on keys with no live worker.
    pub unknown_update: UnknownUpdate,

    /// Which resources to watch.
    pub selector: LabelSelector,
}

impl Config {
    /// Returns the worker tick, never zero.
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        self.tick.max(Duration::from_millis(1))
    }

    /// Returns the reactive timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn reactive_timeout(&self) -> Option<Duration> {
        if self.reactive_timeout == Duration::ZERO {
            None
        } else {
            Some(self.reactive_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tick = 5s`
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `reactive_timeout = 0s` (no timeout)
    /// - `relevant_field = "config"`
    /// - `unknown_update = Ignore`
    /// - `selector` = everything
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            reactive_timeout: Duration::ZERO,
            relevant_field: "config".to_string(),
            unknown_update: UnknownUpdate::default(),
            selector: LabelSelector::everything(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.reactive_timeout(), None);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(5));

        cfg.tick = Duration::ZERO;
        cfg.bus_capacity = 0;
        cfg.reactive_timeout = Duration::from_millis(250);
        assert_eq!(cfg.tick_interval(), Duration::from_millis(1));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.reactive_timeout(), Some(Duration::from_millis(250)));
    }
}
