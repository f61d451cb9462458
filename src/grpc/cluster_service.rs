use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::cluster::ClusterNode;
use crate::grpc::convert;
use crate::proto;
use crate::scheduler::Scheduler;

use super::status_from;

/// Peer-facing RPC surface: registration, heartbeats and remote fires.
pub struct ClusterRpcService {
    scheduler: Scheduler,
    node: Arc<ClusterNode>,
}

impl ClusterRpcService {
    pub fn new(scheduler: Scheduler, node: Arc<ClusterNode>) -> Self {
        Self { scheduler, node }
    }
}

#[tonic::async_trait]
impl proto::cluster_server::Cluster for ClusterRpcService {
    async fn register(
        &self,
        request: Request<proto::NodeRecord>,
    ) -> Result<Response<proto::NodeRecord>, Status> {
        let record = convert::node_from_proto(request.into_inner());
        let reply = self.node.register_node(record).await;
        Ok(Response::new(convert::node_to_proto(&reply)))
    }

    async fn ping(
        &self,
        request: Request<proto::NodeRecord>,
    ) -> Result<Response<proto::NodeRecord>, Status> {
        let record = convert::node_from_proto(request.into_inner());
        let reply = self.node.ping_node(record).await;
        Ok(Response::new(convert::node_to_proto(&reply)))
    }

    async fn run_job(
        &self,
        request: Request<proto::Job>,
    ) -> Result<Response<proto::Empty>, Status> {
        let job = convert::job_from_proto(request.into_inner())?;
        self.scheduler.run_job(job).await.map_err(status_from)?;
        Ok(Response::new(proto::Empty {}))
    }
}
