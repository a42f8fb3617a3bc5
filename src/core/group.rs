//! # Task group: supervised submission with first-failure-wins.
//!
//! Every unit of work (the event loop, long-running workers, one-shot
//! reactive tasks) is submitted through a [`TaskGroup`]. The group shares one
//! cancellation token with all of them.
//!
//! ## Flow
//! ```text
//! submit(name, key, fut) ──► tracker.spawn(catch_unwind(fut))
//!                                   │
//!                ┌──────────────────┼──────────────────────┐
//!                ▼                  ▼                      ▼
//!          Ok / Canceled      Err(e) (first)          Err(e) (later)
//!           (nothing)      record failure,           discarded
//!                          cancel token, close
//!
//! wait() ──► all tasks exited (after close or cancellation)
//!        ──► FirstFailure(f) | CancelledByCaller | AllCompleted
//! ```
//!
//! ## Rules
//! - `submit` fails with [`SubmitError::Closed`] once the group is closed or cancelled
//! - `TaskError::Canceled` is a graceful exit, never a failure
//! - panics are caught and recorded as `TaskError::Fatal`
//! - `wait` returns once the group is closed (or cancelled) **and** every task has exited

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::core::panic_message;
use crate::error::{RuntimeError, SubmitError, TaskError};
use crate::resource::ResourceKey;

/// The failure that cancelled a group, correlated to its originating task.
#[derive(Clone, Debug)]
pub struct GroupFailure {
    /// Name of the failing task.
    pub task: Arc<str>,
    /// Resource the task was bound to, if any.
    pub key: Option<ResourceKey>,
    /// What went wrong.
    pub error: TaskError,
}

impl From<GroupFailure> for RuntimeError {
    fn from(f: GroupFailure) -> Self {
        match f.error {
            TaskError::Source(source) => RuntimeError::SourceDisconnected { source },
            error => RuntimeError::TaskFailed {
                task: f.task.to_string(),
                key: f.key,
                source: error,
            },
        }
    }
}

/// Final aggregation of every task result of a group.
#[derive(Clone, Debug)]
pub enum GroupOutcome {
    /// Every task finished without error and nobody cancelled the group.
    AllCompleted,
    /// The group (or its parent) was cancelled from outside; no task failed.
    CancelledByCaller,
    /// The first task failure; it cancelled everything else.
    FirstFailure(GroupFailure),
}

impl GroupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, GroupOutcome::FirstFailure(_))
    }

    /// Converts to the process exit contract: success or the first failure.
    pub fn into_result(self) -> Result<(), RuntimeError> {
        match self {
            GroupOutcome::FirstFailure(f) => Err(f.into()),
            GroupOutcome::AllCompleted | GroupOutcome::CancelledByCaller => Ok(()),
        }
    }
}

struct Inner {
    tracker: TaskTracker,
    token: CancellationToken,
    failure: Mutex<Option<GroupFailure>>,
}

impl Inner {
    fn fail(&self, failure: GroupFailure) {
        {
            let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() || self.token.is_cancelled() {
                return;
            }
            *slot = Some(failure);
        }
        self.token.cancel();
        self.tracker.close();
    }
}

/// Aggregates spawned tasks, propagates the first failure as cancellation.
///
/// Cheap to clone; clones share the same group.
#[derive(Clone)]
pub struct TaskGroup {
    inner: Arc<Inner>,
}

impl TaskGroup {
    /// Creates an open group whose token is a child of `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                tracker: TaskTracker::new(),
                token: parent.child_token(),
                failure: Mutex::new(None),
            }),
        }
    }

    /// Shared cancellation signal of the group. Derive per-task tokens from it.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Submits a task.
    ///
    /// The future should observe [`TaskGroup::token`] (or a token derived from it)
    /// and exit once it is cancelled.
    pub fn submit<F>(
        &self,
        task: impl Into<Arc<str>>,
        key: Option<ResourceKey>,
        fut: F,
    ) -> Result<(), SubmitError>
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(SubmitError::Closed);
        }

        let task = task.into();
        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            let result = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(TaskError::Fatal {
                        error: format!("panic: {}", panic_message(panic.as_ref())),
                    })
                });

            match result {
                Ok(()) | Err(TaskError::Canceled) => {}
                Err(error) => inner.fail(GroupFailure { task, key, error }),
            }
        });
        Ok(())
    }

    /// Stops accepting submissions. Running tasks are unaffected.
    pub fn close(&self) {
        self.inner.tracker.close();
    }

    /// Cancels every task and stops accepting submissions.
    pub fn cancel(&self) {
        self.inner.token.cancel();
        self.inner.tracker.close();
    }

    /// True once submissions are rejected.
    pub fn is_closed(&self) -> bool {
        self.inner.tracker.is_closed() || self.inner.token.is_cancelled()
    }

    /// Completes when the group is cancelled (first failure or caller).
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.inner.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tracker.is_empty()
    }

    /// The recorded first failure, if any.
    pub fn failure(&self) -> Option<GroupFailure> {
        self.inner
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until the group is closed or cancelled and all tasks have exited.
    pub async fn wait(&self) -> GroupOutcome {
        tokio::select! {
            _ = self.inner.tracker.wait() => {}
            _ = self.inner.token.cancelled() => {
                self.inner.tracker.close();
                self.inner.tracker.wait().await;
            }
        }
        self.outcome()
    }

    fn outcome(&self) -> GroupOutcome {
        if let Some(failure) = self.failure() {
            GroupOutcome::FirstFailure(failure)
        } else if self.inner.token.is_cancelled() {
            GroupOutcome::CancelledByCaller
        } else {
            GroupOutcome::AllCompleted
        }
    }
}
