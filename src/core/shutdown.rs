//! # OS termination signals.
//!
//! [`shutdown_signal`] completes once the process is asked to stop:
//! - unix: `SIGINT`, `SIGTERM`, `SIGQUIT` (and Ctrl-C)
//! - elsewhere: Ctrl-C via [`tokio::signal::ctrl_c`]
//!
//! If the handlers cannot be installed the future never completes, so a run
//! without signal support keeps going until its source ends or fails.

/// Completes on the first termination signal and returns its name.
pub async fn shutdown_signal() -> &'static str {
    match wait_for_signal().await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(error = %e, "signal handlers unavailable; shutdown by signal disabled");
            std::future::pending().await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
