//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quartzite::{FuncRegistry, Job, JobKind, MemoryStore, Scheduler};

pub const COUNT_FUNC: &str = "test.count";

/// Registry with a single function that bumps the returned counter on
/// every fire.
pub fn counting_registry() -> (FuncRegistry, Arc<AtomicUsize>) {
    let registry = FuncRegistry::new();
    let count = Arc::new(AtomicUsize::new(0));
    let fired = count.clone();
    registry.register(COUNT_FUNC, "bump a counter", move |_token, _job| {
        let fired = fired.clone();
        Box::pin(async move {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    });
    (registry, count)
}

pub async fn new_scheduler(registry: FuncRegistry) -> Scheduler {
    Scheduler::new(Arc::new(MemoryStore::new()), registry)
        .await
        .expect("scheduler setup")
}

pub fn interval_job(interval: &str) -> Job {
    Job {
        name: "job".to_string(),
        kind: JobKind::Interval,
        interval: interval.to_string(),
        func_name: COUNT_FUNC.to_string(),
        ..Default::default()
    }
}
