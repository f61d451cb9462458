use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cluster::{self, ClusterNode};
use crate::error::{QuartziteError, Result};
use crate::job::{self, Job, JobKind, JobStatus};
use crate::registry::FuncRegistry;
use crate::scheduler::timing;
use crate::store::Store;

/// The scheduler engine.
///
/// In standalone mode it only fires jobs on schedule. In cluster mode the
/// main node additionally allocates due jobs across cluster nodes; other
/// nodes idle their loop with a quiet 1-second poll.
///
/// Cheap to clone; all clones share the same engine state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    registry: FuncRegistry,
    cluster: OnceLock<Arc<ClusterNode>>,
    is_running: RwLock<bool>,
    // Signals the run loop to exit. Bounded so `stop` never blocks.
    quit_tx: Mutex<Option<mpsc::Sender<()>>>,
    // Pulls the run loop's deadline to "now" when a mutation produces an
    // earlier min next-run time than the current sleep.
    wakeup: Notify,
}

impl Scheduler {
    /// Bind a store and build an engine. Runs the store's one-time setup.
    pub async fn new(store: Arc<dyn Store>, registry: FuncRegistry) -> Result<Self> {
        store.init().await?;
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                registry,
                cluster: OnceLock::new(),
                is_running: RwLock::new(false),
                quit_tx: Mutex::new(None),
                wakeup: Notify::new(),
            }),
        })
    }

    /// Bind the cluster node. Call once, before `start`.
    pub fn bind_cluster_node(&self, node: Arc<ClusterNode>) {
        let _ = self.inner.cluster.set(node);
    }

    pub fn is_cluster_mode(&self) -> bool {
        self.inner.cluster.get().is_some()
    }

    pub fn cluster_node(&self) -> Option<Arc<ClusterNode>> {
        self.inner.cluster.get().cloned()
    }

    pub fn registry(&self) -> &FuncRegistry {
        &self.inner.registry
    }

    pub async fn is_running(&self) -> bool {
        *self.inner.is_running.read().await
    }

    /// Validate, assign identity and defaults, compute the first run time
    /// and persist.
    pub async fn add_job(&self, mut job: Job) -> Result<Job> {
        job.id = Job::new_id();
        job.apply_defaults();

        if !self.inner.registry.contains(&job.func_name) {
            return Err(QuartziteError::FuncUnregistered(job.func_name));
        }
        job.check()?;
        job.next_run_time = timing::calc_next_run_time(&job)?;

        tracing::info!(job = %job.full_name(), "scheduler add job");

        self.inner.store.add_job(job.clone()).await?;

        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Result<Job> {
        self.inner.store.get_job(id).await
    }

    pub async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        self.inner.store.get_all_jobs().await
    }

    /// Re-validate and persist a mutated job, recomputing its next run
    /// time. If the new store-wide minimum is earlier than the currently
    /// projected wake-up, the run loop is woken immediately.
    pub async fn update_job(&self, mut job: Job) -> Result<Job> {
        // Existence check; absent ids surface as JobNotFound.
        self.get_job(&job.id).await?;

        if !self.inner.registry.contains(&job.func_name) {
            return Err(QuartziteError::FuncUnregistered(job.func_name));
        }
        job.check()?;
        job.next_run_time = timing::calc_next_run_time(&job)?;

        let last_interval = self.get_next_wakeup_interval().await;

        self.inner.store.update_job(job.clone()).await?;

        let next_interval = self.get_next_wakeup_interval().await;
        if next_interval < last_interval {
            self.wakeup();
        }

        Ok(job)
    }

    pub async fn delete_job(&self, id: &str) -> Result<()> {
        tracing::info!(job_id = id, "scheduler delete job");

        self.get_job(id).await?;
        self.inner.store.delete_job(id).await
    }

    pub async fn delete_all_jobs(&self) -> Result<()> {
        tracing::info!("scheduler delete all jobs");

        self.inner.store.delete_all_jobs().await
    }

    /// Pausing pins `next_run_time` to the far-future sentinel.
    pub async fn pause_job(&self, id: &str) -> Result<Job> {
        tracing::info!(job_id = id, "scheduler pause job");

        let mut job = self.get_job(id).await?;
        job.status = JobStatus::Paused;
        self.update_job(job).await
    }

    pub async fn resume_job(&self, id: &str) -> Result<Job> {
        tracing::info!(job_id = id, "scheduler resume job");

        let mut job = self.get_job(id).await?;
        job.status = JobStatus::Running;
        self.update_job(job).await
    }

    /// Fire the job once, out-of-band. Neither `next_run_time` nor
    /// `last_run_time` is touched.
    pub async fn run_job(&self, job: Job) -> Result<()> {
        tracing::info!(job = %job.full_name(), "scheduler run job");

        self.run_job_local(job);

        Ok(())
    }

    /// Pick a target node by queue filter and dispatch the fire, local or
    /// remote, without recomputing the schedule.
    pub async fn schedule_job(&self, job: Job) -> Result<()> {
        tracing::info!(job = %job.full_name(), "scheduler schedule job");

        self.dispatch_job(&job).await
    }

    /// Fire `job` on this node or on a cluster peer chosen by queue.
    /// In cluster mode all nodes are equal and the choice may be self.
    async fn dispatch_job(&self, job: &Job) -> Result<()> {
        let Some(node) = self.inner.cluster.get() else {
            self.run_job_local(job.clone());
            return Ok(());
        };

        match node.choice_node(&job.queues).await {
            Ok(target) if target.endpoint != node.endpoint => {
                cluster::rpc::spawn_run_job_remote(target, job.clone());
                Ok(())
            }
            _ => {
                if job.queues.is_empty() || job.queues.contains(&node.queue) {
                    self.run_job_local(job.clone());
                    Ok(())
                } else {
                    Err(QuartziteError::NoEligibleNode(job.queues.clone()))
                }
            }
        }
    }

    /// Local execution. The handler runs on its own task bounded by the
    /// job's timeout; on timeout the token is cancelled and the task is
    /// left to observe it. Panics are confined to the fire.
    fn run_job_local(&self, job: Job) {
        let Some(handler) = self.inner.registry.get(&job.func_name) else {
            tracing::warn!(
                job = %job.full_name(),
                func = %job.func_name,
                "job func unregistered"
            );
            return;
        };

        tracing::info!(
            job = %job.full_name(),
            next_run_time = %job.next_run_time,
            "job is running"
        );

        tokio::spawn(async move {
            let timeout = match job::parse_duration(&job.timeout) {
                Ok(t) => t,
                Err(e) => {
                    let err = QuartziteError::JobTimeout {
                        job: job.full_name(),
                        timeout: job.timeout.clone(),
                        detail: e,
                    };
                    tracing::error!(error = %err, "job run aborted");
                    return;
                }
            };

            let full_name = job.full_name();
            let token = CancellationToken::new();
            let fire = tokio::spawn(handler(token.clone(), job));

            match tokio::time::timeout(timeout, fire).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    tracing::error!(job = %full_name, error = %e, "job run panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    // No forced kill; cancellation is the only signal.
                    token.cancel();
                    tracing::warn!(job = %full_name, "job run timeout");
                }
            }
        });
    }

    /// Persist post-fire state: stamp `last_run_time`, delete a consumed
    /// one-shot, otherwise write the recomputed schedule back.
    async fn flush_job(&self, mut job: Job, now: DateTime<Utc>) -> Result<()> {
        job.last_run_time = timing::truncate_to_second(now);

        if job.kind == JobKind::Datetime {
            if job.next_run_time < now {
                self.delete_job(&job.id).await?;
            }
        } else {
            self.update_job(job).await?;
        }

        Ok(())
    }

    /// Sleep until the earliest stored `next_run_time`, clamped so a
    /// past-due minimum (or a store error) retries within a second.
    async fn get_next_wakeup_interval(&self) -> Duration {
        let next_min = match self.inner.store.get_next_run_time().await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "scheduler get next wakeup interval error");
                Utc::now() + chrono::Duration::seconds(1)
            }
        };

        (next_min - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(1))
    }

    fn wakeup(&self) {
        self.inner.wakeup.notify_one();
    }

    /// Spawn the run loop. Idempotent; a repeat call logs and returns.
    pub async fn start(&self) {
        let mut running = self.inner.is_running.write().await;
        if *running {
            tracing::info!("scheduler is running");
            return;
        }

        let (quit_tx, quit_rx) = mpsc::channel(3);
        *self.inner.quit_tx.lock().await = Some(quit_tx);
        *running = true;

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(quit_rx).await;
        });

        tracing::info!("scheduler start");
    }

    /// Signal the run loop to exit. In-flight fires are not cancelled;
    /// they outlive the engine. Idempotent.
    pub async fn stop(&self) {
        let mut running = self.inner.is_running.write().await;
        if !*running {
            tracing::info!("scheduler has stopped");
            return;
        }

        if let Some(quit_tx) = self.inner.quit_tx.lock().await.take() {
            let _ = quit_tx.try_send(());
        }
        *running = false;

        tracing::info!("scheduler stop");
    }

    /// The run loop: fire due jobs, flush their state, then sleep until
    /// the earliest next run time. Mutations that move that minimum
    /// earlier reset the deadline through `wakeup`.
    async fn run(&self, mut quit_rx: mpsc::Receiver<()>) {
        let mut wake_at = Instant::now();

        loop {
            tokio::select! {
                _ = quit_rx.recv() => {
                    tracing::info!("scheduler quit");
                    return;
                }
                _ = self.inner.wakeup.notified() => {
                    wake_at = Instant::now();
                }
                _ = tokio::time::sleep_until(wake_at) => {
                    wake_at = Instant::now() + self.tick().await;
                }
            }
        }
    }

    /// One wake-up: fire everything due, return the next sleep interval.
    async fn tick(&self) -> Duration {
        // Only the main node schedules; everyone else idles quietly.
        if let Some(node) = self.inner.cluster.get() {
            if !node.is_main_node() {
                return Duration::from_secs(1);
            }
        }

        let now = Utc::now();

        let mut jobs = match self.get_all_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "scheduler get all jobs error");
                return Duration::from_secs(1);
            }
        };

        if jobs.is_empty() {
            return Duration::from_secs(1);
        }

        // Ascending by next run time; the first future job cuts the scan,
        // so the cost is in due jobs, not total jobs.
        jobs.sort_by(|a, b| {
            a.next_run_time
                .cmp(&b.next_run_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        for mut job in jobs {
            if job.next_run_time >= now {
                break;
            }

            job.next_run_time = match timing::calc_next_run_time(&job) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "scheduler calc next run time error");
                    continue;
                }
            };

            if let Err(e) = self.dispatch_job(&job).await {
                tracing::error!(job = %job.full_name(), error = %e, "scheduler schedule job error");
            }

            if let Err(e) = self.flush_job(job, now).await {
                tracing::error!(error = %e, "scheduler flush job error");
                continue;
            }
        }

        let interval = self.get_next_wakeup_interval().await;
        tracing::debug!(?interval, "scheduler next wakeup interval");
        interval
    }

    /// Scheduler metadata for introspection surfaces.
    pub async fn info(&self) -> serde_json::Value {
        let mut info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "is_cluster_mode": self.is_cluster_mode(),
            "is_running": self.is_running().await,
            "cluster_main_node": {},
        });

        if let Some(node) = self.inner.cluster.get() {
            info["cluster_main_node"] = serde_json::json!({
                "endpoint_main": node.endpoint_main,
                "endpoint": node.endpoint,
                "endpoint_grpc": node.endpoint_grpc,
                "endpoint_http": node.endpoint_http,
                "mode": node.mode,
            });
        }

        info
    }
}
