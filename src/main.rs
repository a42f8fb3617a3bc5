//! Demo: watch an in-memory resource store and supervise one worker per resource.
//!
//! Seeds a labelled resource, changes its `config` field a few times (plus one
//! irrelevant change that is filtered out), then deletes it and closes the
//! store. One-shot reactive work fails at random with `--failure-ratio`,
//! which cancels the whole run.
//!
//! ```text
//! RUST_LOG=debug cargo run -- --tick-ms 500 --updates 3 --failure-ratio 0.3
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use watchvisor::{
    Config, LabelSelector, LogWorkload, LogWriter, MemoryStore, ResourceKey, ResourceSnapshot,
    Subscribe, Supervisor, TaskError, Workload, logging,
};

#[derive(Parser, Debug)]
#[command(name = "watchvisor", version, about = "One supervised worker per watched resource")]
struct Args {
    /// Label selector for resource filtering.
    #[arg(long, default_value = "component=my-config")]
    label_selector: String,

    /// Worker tick interval in milliseconds.
    #[arg(long, default_value_t = 5000)]
    tick_ms: u64,

    /// Shutdown grace period in seconds.
    #[arg(long, default_value_t = 30)]
    grace_secs: u64,

    /// Probability (0.0..=1.0) that one-shot processing fails.
    #[arg(long, default_value_t = 0.3)]
    failure_ratio: f64,

    /// Namespace of the demo resource.
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Name of the demo resource.
    #[arg(long, default_value = "test-config")]
    resource: String,

    /// Number of `config` changes to apply before deleting the resource.
    #[arg(long, default_value_t = 3)]
    updates: u32,
}

/// Logs like [`LogWorkload`], but fails one-shot work with a fixed probability.
struct ChaosWorkload {
    inner: LogWorkload,
    failure_ratio: f64,
}

#[async_trait]
impl Workload for ChaosWorkload {
    async fn on_tick(&self, snapshot: &ResourceSnapshot, tick: u64) -> Result<(), TaskError> {
        self.inner.on_tick(snapshot, tick).await
    }

    async fn on_change(
        &self,
        snapshot: &ResourceSnapshot,
        ctx: CancellationToken,
    ) -> Result<(), TaskError> {
        let roll = rand::rng().random_range(0.0..1.0);
        self.inner.on_change(snapshot, ctx).await?;
        if roll < self.failure_ratio {
            return Err(TaskError::fail(format!(
                "random failure while processing {}",
                snapshot.key()
            )));
        }
        Ok(())
    }
}

/// Drives the store through create → updates → delete → close.
async fn scenario(store: Arc<MemoryStore>, key: ResourceKey, tick: Duration, updates: u32) {
    let base = ResourceSnapshot::new(key.clone())
        .with_label("component", "my-config")
        .with_label("app", "myapp");

    let step = tick * 2;
    let mut current = match store.create_if_absent(base.clone().with_data("config", "v0")) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "seeding failed");
            store.close();
            return;
        }
    };
    tracing::info!(resource = %key, "created resource");

    for i in 1..=updates {
        tokio::time::sleep(step).await;
        let next = current.clone().with_data("config", format!("v{i}"));
        match store.apply(next) {
            Ok(s) => current = s,
            Err(e) => {
                tracing::warn!(error = %e, "store rejected update");
                return;
            }
        }

        // Metadata churn only; filtered by the supervisor.
        if i == 1 {
            match store.apply(current.clone().with_data("owner", "ops")) {
                Ok(s) => current = s,
                Err(e) => tracing::warn!(error = %e, "store rejected metadata change"),
            }
        }
    }

    tokio::time::sleep(step).await;
    tracing::info!(resource = %key, "deleting resource");
    if let Err(e) = store.delete(&key) {
        tracing::warn!(resource = %key, error = %e, "store rejected delete");
    }
    tokio::time::sleep(tick).await;
    store.close();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let args = Args::parse();

    let selector = LabelSelector::parse(&args.label_selector)
        .with_context(|| format!("invalid --label-selector {:?}", args.label_selector))?;
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.failure_ratio),
        "--failure-ratio must be within 0.0..=1.0"
    );

    let cfg = Config {
        tick: Duration::from_millis(args.tick_ms),
        grace: Duration::from_secs(args.grace_secs),
        selector,
        ..Config::default()
    };
    let tick = cfg.tick_interval();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(cfg)
        .with_workload(Arc::new(ChaosWorkload {
            inner: LogWorkload,
            failure_ratio: args.failure_ratio,
        }))
        .with_subscribers(subs)
        .build();

    let store = Arc::new(MemoryStore::new());
    let key = ResourceKey::new(args.namespace, args.resource);
    tokio::spawn(scenario(Arc::clone(&store), key, tick, args.updates));

    if let Err(e) = sup.run(store.as_ref()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!("Finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scenario_closes_store_when_delete_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let key = ResourceKey::new("default", "test-config");
        let tick = Duration::from_secs(1);
        let run = tokio::spawn(scenario(Arc::clone(&store), key.clone(), tick, 1));

        // Remove the resource before the scenario's own delete at 4 ticks.
        tokio::time::sleep(tick * 3).await;
        assert_eq!(store.get(&key).unwrap().field("config"), Some("v1"));
        store.delete(&key).unwrap();

        run.await.unwrap();
        assert!(store.create(ResourceSnapshot::new(key)).is_err());
    }
}
