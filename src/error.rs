//! Error types used by the watchvisor runtime, its tasks and collaborators.
//!
//! - [`RuntimeError`] — the single terminal error of a supervisor run.
//! - [`TaskError`] — errors raised by worker and one-shot executions.
//! - [`SourceError`] — errors surfaced by an [`EventSource`](crate::EventSource) stream.
//! - [`RegistryError`] — worker registry contract violations.
//! - [`SubmitError`] — submission to a closed [`TaskGroup`](crate::TaskGroup).
//! - [`StoreError`] — resource-store collaborator failures.
//!
//! Every enum provides `as_label` (stable snake_case label for logs).

use std::time::Duration;
use thiserror::Error;

use crate::resource::ResourceKey;

/// # Errors produced by the watchvisor runtime.
///
/// Returned by [`Supervisor::run`](crate::Supervisor::run). Exactly one of
/// these describes why a run ended unsuccessfully.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// A supervised task failed; the whole group was cancelled.
    #[error("task {task} failed: {source}")]
    TaskFailed {
        /// Name of the failing task (`worker/<ns>/<name>`, `reactive/<ns>/<name>`, ...).
        task: String,
        /// Resource the task was bound to, if any.
        key: Option<ResourceKey>,
        /// The task error.
        source: TaskError,
    },

    /// The event source broke; fatal to the run, never retried here.
    #[error("event source disconnected: {source}")]
    SourceDisconnected {
        /// The source error.
        source: SourceError,
    },

    /// Shutdown grace period was exceeded; some tasks remained stuck.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that did not exit in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use watchvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::TaskFailed { .. } => "runtime_task_failed",
            RuntimeError::SourceDisconnected { .. } => "runtime_source_disconnected",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Resource key the failure originated from, if known.
    pub fn key(&self) -> Option<&ResourceKey> {
        match self {
            RuntimeError::TaskFailed { key, .. } => key.as_ref(),
            _ => None,
        }
    }
}

/// # Errors produced by task execution.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Execution exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (also used for caught panics).
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation and exited. Not a failure.
    #[error("context cancelled")]
    Canceled,

    /// The event stream reported an error.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use watchvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Source(_) => "task_source",
        }
    }

    /// True for a graceful, cancellation-driven exit.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Errors produced by an event source stream.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Underlying connection closed abnormally.
    #[error("disconnected: {reason}")]
    Disconnected {
        /// Why the connection went away.
        reason: String,
    },

    /// A raw notification could not be decoded into a typed event.
    #[error("undecodable notification: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },
}

impl SourceError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Disconnected { .. } => "source_disconnected",
            SourceError::Decode { .. } => "source_decode",
        }
    }
}

/// Worker registry contract violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("worker for {key} already registered")]
    AlreadyRegistered { key: ResourceKey },

    #[error("no worker registered for {key}")]
    NotFound { key: ResourceKey },
}

/// Error returned by [`TaskGroup::submit`](crate::TaskGroup::submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Group no longer accepts tasks (closed, failed or cancelled).
    #[error("task group closed")]
    Closed,
}

/// Errors of the resource-store collaborator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("resource {key} not found")]
    NotFound { key: ResourceKey },

    #[error("resource {key} already exists")]
    AlreadyExists { key: ResourceKey },

    /// Store was closed; no further writes or subscriptions.
    #[error("store closed")]
    Closed,
}
