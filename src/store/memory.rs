use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{QuartziteError, Result};
use crate::job::Job;
use crate::scheduler::timing;
use crate::store::Store;

/// In-memory job store. Jobs live only as long as the process; useful for
/// standalone schedulers and tests.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn add_job(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(QuartziteError::Store(format!(
                "job id `{}` already exists",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| QuartziteError::JobNotFound(id.to_string()))
    }

    async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().cloned().collect())
    }

    async fn update_job(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(QuartziteError::JobNotFound(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn delete_job(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id);
        Ok(())
    }

    async fn delete_all_jobs(&self) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.clear();
        Ok(())
    }

    async fn get_next_run_time(&self) -> Result<DateTime<Utc>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .map(|j| j.next_run_time)
            .min()
            .unwrap_or_else(timing::next_run_time_max_utc))
    }

    async fn clear(&self) -> Result<()> {
        self.delete_all_jobs().await
    }
}
