use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::cluster::ClusterNode;
use crate::error::Result;
use crate::grpc::cluster_service::ClusterRpcService;
use crate::grpc::scheduler_service::SchedulerService;
use crate::proto::cluster_server::ClusterServer;
use crate::proto::scheduler_server::SchedulerServer;
use crate::scheduler::Scheduler;

/// The scheduler operation surface over gRPC.
pub struct GrpcService {
    addr: SocketAddr,
    scheduler: Scheduler,
}

impl GrpcService {
    pub fn new(addr: SocketAddr, scheduler: Scheduler) -> Self {
        Self { addr, scheduler }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(addr = %self.addr, "grpc service listening");

        Server::builder()
            .add_service(SchedulerServer::new(SchedulerService::new(self.scheduler)))
            .serve_with_shutdown(self.addr, shutdown.cancelled_owned())
            .await?;

        Ok(())
    }
}

/// The peer coordination surface over gRPC; listens on the node's
/// cluster endpoint.
pub struct ClusterRpcServer {
    addr: SocketAddr,
    scheduler: Scheduler,
    node: Arc<ClusterNode>,
}

impl ClusterRpcServer {
    pub fn new(addr: SocketAddr, scheduler: Scheduler, node: Arc<ClusterNode>) -> Self {
        Self {
            addr,
            scheduler,
            node,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(addr = %self.addr, "cluster rpc service listening");

        Server::builder()
            .add_service(ClusterServer::new(ClusterRpcService::new(
                self.scheduler,
                self.node,
            )))
            .serve_with_shutdown(self.addr, shutdown.cancelled_owned())
            .await?;

        Ok(())
    }
}
