use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cluster::ClusterNode;
use crate::config::NodeConfig;
use crate::error::{QuartziteError, Result};
use crate::grpc::{ClusterRpcServer, GrpcService};
use crate::http::HttpService;
use crate::registry::FuncRegistry;
use crate::scheduler::Scheduler;
use crate::store::Store;

/// One scheduler process: engine, optional cluster identity, and the
/// gRPC/HTTP surfaces, wired together.
pub struct Node {
    pub config: NodeConfig,
    pub scheduler: Scheduler,
    pub cluster: Option<Arc<ClusterNode>>,
}

impl Node {
    pub async fn new(
        config: NodeConfig,
        store: Arc<dyn Store>,
        registry: FuncRegistry,
    ) -> Result<Self> {
        let scheduler = Scheduler::new(store, registry).await?;

        let cluster = config
            .cluster
            .clone()
            .map(|c| Arc::new(ClusterNode::new(c)));
        if let Some(node) = &cluster {
            scheduler.bind_cluster_node(node.clone());
        }

        Ok(Self {
            config,
            scheduler,
            cluster,
        })
    }

    /// Run every subsystem until the shutdown token fires:
    /// cluster bookkeeping, the engine's run loop, the HTTP gateway and
    /// (blocking this call) the scheduler gRPC surface.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        if let Some(node) = &self.cluster {
            node.init().await;

            let addr = parse_addr(&node.endpoint)?;
            let server = ClusterRpcServer::new(addr, self.scheduler.clone(), node.clone());
            let token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = server.run(token).await {
                    tracing::error!(error = %e, "cluster rpc service failed");
                }
            });
        }

        self.scheduler.start().await;

        let http_addr = parse_addr(&self.config.http_address)?;
        let http = HttpService::new(http_addr, self.scheduler.clone());
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = http.run(token).await {
                tracing::error!(error = %e, "http service failed");
            }
        });

        let grpc_addr = parse_addr(&self.config.grpc_address)?;
        let grpc = GrpcService::new(grpc_addr, self.scheduler.clone());
        let result = grpc.run(shutdown).await;

        self.scheduler.stop().await;

        result
    }
}

fn parse_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| QuartziteError::Internal(format!("invalid address `{addr}`: {e}")))
}
