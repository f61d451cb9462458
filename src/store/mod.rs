pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::job::Job;

pub use memory::MemoryStore;

/// Contract any persistence backend must honor.
///
/// Each method must appear atomic to concurrent callers, `get_all_jobs`
/// must return a consistent snapshot, and a stored job must round-trip
/// byte-identical (all timestamps are second-precision UTC).
#[async_trait]
pub trait Store: Send + Sync {
    /// One-time setup.
    async fn init(&self) -> Result<()>;

    /// Insert; rejects a duplicate id.
    async fn add_job(&self, job: Job) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Job>;

    async fn get_all_jobs(&self) -> Result<Vec<Job>>;

    /// Replace by id.
    async fn update_job(&self, job: Job) -> Result<()>;

    /// Remove; deleting an absent id is a success.
    async fn delete_job(&self, id: &str) -> Result<()>;

    async fn delete_all_jobs(&self) -> Result<()>;

    /// Smallest `next_run_time` across all stored jobs, or the
    /// far-future sentinel when the store is empty.
    async fn get_next_run_time(&self) -> Result<DateTime<Utc>>;

    /// Teardown/reset.
    async fn clear(&self) -> Result<()>;
}
