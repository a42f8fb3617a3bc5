//! # Live task tracker with sequence-based ordering.
//!
//! Maintains which supervised tasks (workers and one-shot reactive tasks) are
//! currently running, using event sequence numbers to handle out-of-order
//! delivery. Supplies the `stuck` list when the shutdown grace is exceeded.
//!
//! ## Architecture
//! ```text
//! WorkerTask / ReactiveTask ──► Bus ──► subscriber_listener() ──► AliveTracker::update()
//!                                                                        │
//!                                                                        ▼
//!                                                            HashMap<String, TaskState>
//!                                                                (name → {seq, alive})
//! ```
//!
//! ## Rules
//! - `WorkerStarting` / `ReactiveStarting` mark a task alive
//! - `WorkerStopped` / `WorkerFailed` / `ReactiveCompleted` / `ReactiveFailed` mark it dead
//! - other events only advance `last_seq`
//! - events with `seq <= last_seq` are rejected (stale)

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Debug, Clone)]
struct TaskState {
    last_seq: u64,
    alive: bool,
}

/// Thread-safe tracker of live supervised tasks.
#[derive(Default)]
pub struct AliveTracker {
    state: RwLock<HashMap<String, TaskState>>,
}

impl AliveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `ev` if it is newer than the last event seen for its task.
    ///
    /// Returns `true` if the alive state changed hands (start or stop applied).
    ///
    /// ```text
    /// update(WorkerStopped,  seq=100) → alive=false, last_seq=100
    /// update(WorkerStarting, seq=99)  → rejected (stale)
    /// ```
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(name) = ev.task.as_deref() else {
            return false;
        };

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(TaskState {
            last_seq: 0,
            alive: false,
        });
        if entry.last_seq != 0 && ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;

        match ev.kind {
            EventKind::WorkerStarting | EventKind::ReactiveStarting => {
                entry.alive = true;
                true
            }
            EventKind::WorkerStopped
            | EventKind::WorkerFailed
            | EventKind::ReactiveCompleted
            | EventKind::ReactiveFailed => {
                entry.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Sorted names of tasks currently alive.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .filter(|(_, ts)| ts.alive)
            .map(|(name, _)| name.clone())
            .collect();
        alive.sort_unstable();
        alive
    }

    pub async fn is_alive(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .get(name)
            .is_some_and(|ts| ts.alive)
    }
}
