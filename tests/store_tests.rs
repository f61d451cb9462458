use chrono::{TimeZone, Utc};

use quartzite::scheduler::timing::next_run_time_max;
use quartzite::store::{MemoryStore, Store};
use quartzite::{Job, JobKind, QuartziteError};

fn stored_job(id: &str, next_run_secs: i64) -> Job {
    Job {
        id: id.to_string(),
        name: format!("job-{id}"),
        kind: JobKind::Interval,
        interval: "1s".to_string(),
        func_name: "test.noop".to_string(),
        next_run_time: Utc.timestamp_opt(next_run_secs, 0).unwrap(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_add_and_get_round_trip() {
    let store = MemoryStore::new();
    store.init().await.unwrap();

    let job = stored_job("a1", 1_900_000_000);
    store.add_job(job.clone()).await.unwrap();

    let fetched = store.get_job("a1").await.unwrap();
    assert_eq!(fetched, job);
}

#[tokio::test]
async fn test_add_rejects_duplicate_id() {
    let store = MemoryStore::new();
    store.add_job(stored_job("a1", 0)).await.unwrap();

    let err = store.add_job(stored_job("a1", 1)).await.unwrap_err();
    assert!(matches!(err, QuartziteError::Store(_)));
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let store = MemoryStore::new();
    let err = store.get_job("missing").await.unwrap_err();
    assert!(matches!(err, QuartziteError::JobNotFound(id) if id == "missing"));
}

#[tokio::test]
async fn test_update_replaces_by_id() {
    let store = MemoryStore::new();
    store.add_job(stored_job("a1", 100)).await.unwrap();

    let mut job = stored_job("a1", 200);
    job.name = "renamed".to_string();
    store.update_job(job).await.unwrap();

    let fetched = store.get_job("a1").await.unwrap();
    assert_eq!(fetched.name, "renamed");
    assert_eq!(fetched.next_run_time.timestamp(), 200);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = MemoryStore::new();
    let err = store.update_job(stored_job("ghost", 0)).await.unwrap_err();
    assert!(matches!(err, QuartziteError::JobNotFound(_)));
}

#[tokio::test]
async fn test_delete_absent_is_success() {
    let store = MemoryStore::new();
    store.delete_job("never-added").await.unwrap();
}

#[tokio::test]
async fn test_delete_all_jobs() {
    let store = MemoryStore::new();
    store.add_job(stored_job("a1", 1)).await.unwrap();
    store.add_job(stored_job("a2", 2)).await.unwrap();

    store.delete_all_jobs().await.unwrap();
    assert!(store.get_all_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_next_run_time_is_min_across_jobs() {
    let store = MemoryStore::new();
    store.add_job(stored_job("a1", 3_000)).await.unwrap();
    store.add_job(stored_job("a2", 1_000)).await.unwrap();
    store.add_job(stored_job("a3", 2_000)).await.unwrap();

    let min = store.get_next_run_time().await.unwrap();
    assert_eq!(min.timestamp(), 1_000);
}

#[tokio::test]
async fn test_next_run_time_of_empty_store_is_sentinel() {
    let store = MemoryStore::new();
    let min = store.get_next_run_time().await.unwrap();
    assert_eq!(min, next_run_time_max(chrono_tz::UTC));
}

#[tokio::test]
async fn test_clear_resets_the_store() {
    let store = MemoryStore::new();
    store.add_job(stored_job("a1", 1)).await.unwrap();
    store.clear().await.unwrap();

    assert!(store.get_all_jobs().await.unwrap().is_empty());
    assert_eq!(
        store.get_next_run_time().await.unwrap(),
        next_run_time_max(chrono_tz::UTC)
    );
}
