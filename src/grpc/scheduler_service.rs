use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;

use futures::FutureExt;
use tonic::{Request, Response, Status};

use crate::grpc::convert;
use crate::job::JobStatus;
use crate::proto;
use crate::scheduler::Scheduler;

use super::status_from;

/// gRPC surface re-exposing the scheduler operation set to remote clients.
pub struct SchedulerService {
    scheduler: Scheduler,
}

impl SchedulerService {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Mutations go through the main node; other nodes answer with a
    /// redirect hint.
    fn ensure_main(&self) -> Result<(), Status> {
        if let Some(node) = self.scheduler.cluster_node() {
            if !node.is_main_node() {
                return Err(Status::failed_precondition(format!(
                    "not the main node, redirect to `{}`",
                    node.endpoint_main
                )));
            }
        }
        Ok(())
    }
}

/// Handler panics must not take the server down with them.
async fn guard<T>(fut: impl Future<Output = Result<T, Status>>) -> Result<T, Status> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("panic in scheduler grpc handler");
            Err(Status::internal("internal handler error"))
        }
    }
}

#[tonic::async_trait]
impl proto::scheduler_server::Scheduler for SchedulerService {
    async fn add_job(
        &self,
        request: Request<proto::Job>,
    ) -> Result<Response<proto::Job>, Status> {
        guard(async {
            self.ensure_main()?;
            let job = convert::job_from_proto(request.into_inner())?;
            let added = self.scheduler.add_job(job).await.map_err(status_from)?;
            Ok(Response::new(convert::job_to_proto(&added)))
        })
        .await
    }

    async fn get_job(
        &self,
        request: Request<proto::JobId>,
    ) -> Result<Response<proto::Job>, Status> {
        guard(async {
            let id = request.into_inner().id;
            let job = self.scheduler.get_job(&id).await.map_err(status_from)?;
            Ok(Response::new(convert::job_to_proto(&job)))
        })
        .await
    }

    async fn get_all_jobs(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Jobs>, Status> {
        guard(async {
            let jobs = self.scheduler.get_all_jobs().await.map_err(status_from)?;
            Ok(Response::new(proto::Jobs {
                jobs: jobs.iter().map(convert::job_to_proto).collect(),
            }))
        })
        .await
    }

    async fn update_job(
        &self,
        request: Request<proto::Job>,
    ) -> Result<Response<proto::Job>, Status> {
        guard(async {
            self.ensure_main()?;
            let raw = request.into_inner();
            let raw_status = raw.status.clone();
            let mut job = convert::job_from_proto(raw)?;

            // An absent or unparseable status keeps the stored value.
            if JobStatus::from_str(&raw_status).is_err() {
                let stored = self.scheduler.get_job(&job.id).await.map_err(status_from)?;
                job.status = stored.status;
            }

            let updated = self.scheduler.update_job(job).await.map_err(status_from)?;
            Ok(Response::new(convert::job_to_proto(&updated)))
        })
        .await
    }

    async fn delete_job(
        &self,
        request: Request<proto::JobId>,
    ) -> Result<Response<proto::Empty>, Status> {
        guard(async {
            self.ensure_main()?;
            let id = request.into_inner().id;
            self.scheduler.delete_job(&id).await.map_err(status_from)?;
            Ok(Response::new(proto::Empty {}))
        })
        .await
    }

    async fn delete_all_jobs(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Empty>, Status> {
        guard(async {
            self.ensure_main()?;
            self.scheduler.delete_all_jobs().await.map_err(status_from)?;
            Ok(Response::new(proto::Empty {}))
        })
        .await
    }

    async fn pause_job(
        &self,
        request: Request<proto::JobId>,
    ) -> Result<Response<proto::Job>, Status> {
        guard(async {
            self.ensure_main()?;
            let id = request.into_inner().id;
            let job = self.scheduler.pause_job(&id).await.map_err(status_from)?;
            Ok(Response::new(convert::job_to_proto(&job)))
        })
        .await
    }

    async fn resume_job(
        &self,
        request: Request<proto::JobId>,
    ) -> Result<Response<proto::Job>, Status> {
        guard(async {
            self.ensure_main()?;
            let id = request.into_inner().id;
            let job = self.scheduler.resume_job(&id).await.map_err(status_from)?;
            Ok(Response::new(convert::job_to_proto(&job)))
        })
        .await
    }

    async fn run_job(
        &self,
        request: Request<proto::Job>,
    ) -> Result<Response<proto::Empty>, Status> {
        guard(async {
            let job = convert::job_from_proto(request.into_inner())?;
            self.scheduler.run_job(job).await.map_err(status_from)?;
            Ok(Response::new(proto::Empty {}))
        })
        .await
    }

    async fn schedule_job(
        &self,
        request: Request<proto::Job>,
    ) -> Result<Response<proto::Empty>, Status> {
        guard(async {
            self.ensure_main()?;
            let job = convert::job_from_proto(request.into_inner())?;
            self.scheduler.schedule_job(job).await.map_err(status_from)?;
            Ok(Response::new(proto::Empty {}))
        })
        .await
    }

    async fn start(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Empty>, Status> {
        guard(async {
            self.ensure_main()?;
            self.scheduler.start().await;
            Ok(Response::new(proto::Empty {}))
        })
        .await
    }

    async fn stop(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Empty>, Status> {
        guard(async {
            self.ensure_main()?;
            self.scheduler.stop().await;
            Ok(Response::new(proto::Empty {}))
        })
        .await
    }
}
