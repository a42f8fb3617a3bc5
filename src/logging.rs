//! # Structured logging setup.
//!
//! Console `tracing` output filtered by `RUST_LOG` (default `info`).
//! Safe to call more than once and alongside an already-installed global
//! subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info";

/// Installs the fmt subscriber once per process.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already installed; keeping it");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
