use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::Receiver;
use tokio::time;
use tokio_util::sync::CancellationToken;

use watchvisor::{
    ChannelSource, Config, Event, EventKind, LabelSelector, MemoryStore, ResourceKey,
    ResourceSnapshot, RuntimeError, SourceError, Supervisor, TaskError, Workload,
};

const TICK: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Counting {
    ticks: AtomicU64,
    changes: AtomicU64,
    fail_on_change: bool,
}

#[async_trait]
impl Workload for Counting {
    async fn on_tick(&self, _s: &ResourceSnapshot, _tick: u64) -> Result<(), TaskError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_change(
        &self,
        snapshot: &ResourceSnapshot,
        _ctx: CancellationToken,
    ) -> Result<(), TaskError> {
        self.changes.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_change {
            return Err(TaskError::fail(format!("cannot render {}", snapshot.key())));
        }
        Ok(())
    }
}

fn key(name: &str) -> ResourceKey {
    ResourceKey::new("default", name)
}

fn selected(name: &str, config: &str) -> ResourceSnapshot {
    ResourceSnapshot::new(key(name))
        .with_label("component", "my-config")
        .with_data("config", config)
}

fn supervisor(workload: Arc<Counting>) -> Arc<Supervisor> {
    let cfg = Config {
        tick: TICK,
        grace: Duration::from_secs(5),
        selector: LabelSelector::parse("component=my-config").unwrap(),
        ..Config::default()
    };
    Supervisor::builder(cfg).with_workload(workload).build()
}

fn collect(rx: &mut Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

#[tokio::test(start_paused = true)]
async fn memory_store_lifecycle_ends_cleanly() {
    let workload = Arc::new(Counting::default());
    let sup = supervisor(workload.clone());
    let mut rx = sup.bus().subscribe();

    let store = Arc::new(MemoryStore::new());
    store.create(selected("a", "v1")).unwrap();
    store
        .create(
            ResourceSnapshot::new(key("other"))
                .with_label("component", "unrelated")
                .with_data("config", "v1"),
        )
        .unwrap();

    let writer = Arc::clone(&store);
    tokio::spawn(async move {
        time::sleep(TICK * 2 + TICK / 2).await;
        let current = writer.get(&key("a")).unwrap();
        writer
            .apply(current.clone().with_data("config", "v2"))
            .unwrap();
        time::sleep(TICK / 2).await;
        let current = writer.get(&key("a")).unwrap();
        writer.apply(current.with_data("owner", "ops")).unwrap();
        time::sleep(TICK + TICK / 2).await;
        writer.delete(&key("a")).unwrap();
        time::sleep(TICK / 2).await;
        writer.close();
    });

    sup.run_until(store.as_ref(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(workload.changes.load(Ordering::SeqCst), 1);
    assert_eq!(workload.ticks.load(Ordering::SeqCst), 4);

    let events = collect(&mut rx);
    assert_eq!(count(&events, EventKind::WorkerStarting), 1);
    assert_eq!(count(&events, EventKind::WorkerStopped), 1);
    assert_eq!(count(&events, EventKind::ReactiveCompleted), 1);
    assert_eq!(count(&events, EventKind::SourceEnded), 1);
    assert!(
        events
            .iter()
            .filter(|e| e.kind == EventKind::WorkerStarting)
            .all(|e| e.key == Some(key("a")))
    );
    let ignored: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::EventIgnored)
        .filter_map(|e| e.reason.as_deref())
        .collect();
    assert_eq!(ignored, vec!["unchanged_update"]);
}

#[tokio::test(start_paused = true)]
async fn label_move_stops_and_readmits_worker() {
    let workload = Arc::new(Counting::default());
    let sup = supervisor(workload.clone());
    let mut rx = sup.bus().subscribe();

    let store = Arc::new(MemoryStore::new());
    store.create(selected("a", "v1")).unwrap();

    let writer = Arc::clone(&store);
    tokio::spawn(async move {
        time::sleep(TICK + TICK / 2).await;
        let moved = writer
            .get(&key("a"))
            .unwrap()
            .with_label("component", "elsewhere");
        writer.apply(moved).unwrap();
        time::sleep(TICK).await;
        let back = writer
            .get(&key("a"))
            .unwrap()
            .with_label("component", "my-config");
        writer.apply(back).unwrap();
        time::sleep(TICK * 2).await;
        writer.close();
    });

    sup.run_until(store.as_ref(), CancellationToken::new())
        .await
        .unwrap();

    let events = collect(&mut rx);
    assert_eq!(count(&events, EventKind::WorkerCancelRequested), 2);
    assert_eq!(count(&events, EventKind::WorkerStarting), 2);
    assert_eq!(count(&events, EventKind::WorkerStopped), 2);
    assert_eq!(workload.changes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn reactive_failure_is_the_terminal_error() {
    let workload = Arc::new(Counting {
        fail_on_change: true,
        ..Default::default()
    });
    let sup = supervisor(workload.clone());
    let mut rx = sup.bus().subscribe();

    let store = Arc::new(MemoryStore::new());
    store.create(selected("a", "v1")).unwrap();
    store.create(selected("b", "v1")).unwrap();

    let writer = Arc::clone(&store);
    tokio::spawn(async move {
        time::sleep(TICK * 2).await;
        let current = writer.get(&key("a")).unwrap();
        writer.apply(current.with_data("config", "v2")).unwrap();
    });

    let err = sup
        .run_until(store.as_ref(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.as_label(), "runtime_task_failed");
    assert_eq!(err.key(), Some(&key("a")));
    let RuntimeError::TaskFailed { task, .. } = &err else {
        panic!("expected task failure");
    };
    assert_eq!(task, "reactive/default/a");

    let events = collect(&mut rx);
    assert_eq!(count(&events, EventKind::WorkerStopped), 2);
    assert_eq!(count(&events, EventKind::GroupCancelled), 1);
    assert_eq!(count(&events, EventKind::AllStoppedWithin), 1);
}

#[tokio::test(start_paused = true)]
async fn source_disconnect_is_fatal() {
    let sup = supervisor(Arc::default());
    let store = Arc::new(MemoryStore::new());
    store.create(selected("a", "v1")).unwrap();

    let writer = Arc::clone(&store);
    tokio::spawn(async move {
        time::sleep(TICK * 3).await;
        writer.disconnect("watch expired");
    });

    let err = sup
        .run_until(store.as_ref(), CancellationToken::new())
        .await
        .unwrap_err();
    let RuntimeError::SourceDisconnected { source } = err else {
        panic!("expected source disconnect");
    };
    assert_eq!(
        source,
        SourceError::Disconnected {
            reason: "watch expired".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_and_out_of_order_events_are_absorbed() {
    let workload = Arc::new(Counting::default());
    let sup = supervisor(workload.clone());
    let mut rx = sup.bus().subscribe();

    let (source, tx) = ChannelSource::new();
    tx.updated(selected("a", "v0"), selected("a", "v1"));
    tx.created(selected("a", "v1"));
    tx.created(selected("a", "v1"));
    tx.deleted(key("a"));
    tx.deleted(key("a"));
    drop(tx);

    sup.run_until(&source, CancellationToken::new())
        .await
        .unwrap();

    let events = collect(&mut rx);
    assert_eq!(count(&events, EventKind::WorkerStarting), 1);
    assert_eq!(count(&events, EventKind::WorkerCancelRequested), 1);
    assert_eq!(count(&events, EventKind::EventIgnored), 3);
    assert_eq!(workload.changes.load(Ordering::SeqCst), 0);
}
