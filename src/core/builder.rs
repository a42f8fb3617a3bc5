use std::sync::Arc;

use super::{config::Config, supervisor::Supervisor};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    tasks::{LogWorkload, Workload, WorkloadRef},
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    workload: Option<WorkloadRef>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            workload: None,
        }
    }

    /// Sets the work run by workers and reactive tasks (default: [`LogWorkload`]).
    pub fn with_workload<W: Workload>(mut self, workload: Arc<W>) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Like [`with_workload`](Self::with_workload) for an already type-erased workload.
    pub fn with_workload_ref(mut self, workload: WorkloadRef) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (worker lifecycle, reactive runs,
    /// ignored events, shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor.
    ///
    /// Must be called within a tokio runtime (subscriber workers are spawned here).
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let workload = self
            .workload
            .unwrap_or_else(|| Arc::new(LogWorkload) as WorkloadRef);

        Arc::new(Supervisor::new_internal(self.cfg, bus, subs, workload))
    }
}
