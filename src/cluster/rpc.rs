use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use crate::cluster::NodeRecord;
use crate::error::{QuartziteError, Result};
use crate::grpc::convert;
use crate::job::Job;
use crate::proto::cluster_client::ClusterClient;

/// Fixed deadline for cluster RPC calls.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(3);

async fn connect(endpoint: &str) -> Result<ClusterClient<Channel>> {
    let channel = Endpoint::from_shared(format!("http://{endpoint}"))?
        .connect_timeout(RPC_TIMEOUT)
        .timeout(RPC_TIMEOUT)
        .connect()
        .await?;
    Ok(ClusterClient::new(channel))
}

/// Worker-side `Register` call against the main node.
pub async fn register(main_endpoint: &str, record: NodeRecord) -> Result<NodeRecord> {
    let mut client = connect(main_endpoint).await?;
    let reply = client.register(convert::node_to_proto(&record)).await?;
    Ok(convert::node_from_proto(reply.into_inner()))
}

/// Worker-side `Ping` call against the main node.
pub async fn ping(main_endpoint: &str, record: NodeRecord) -> Result<NodeRecord> {
    let mut client = connect(main_endpoint).await?;
    let reply = client.ping(convert::node_to_proto(&record)).await?;
    Ok(convert::node_from_proto(reply.into_inner()))
}

/// Hand a fire off to a peer. Errors and timeouts are logged on this
/// node, the dispatcher; missed fires are not retried.
pub fn spawn_run_job_remote(node: NodeRecord, job: Job) {
    tokio::spawn(async move {
        let full_name = job.full_name();
        let result = tokio::time::timeout(RPC_TIMEOUT, async {
            let mut client = connect(&node.endpoint).await?;
            client.run_job(convert::job_to_proto(&job)).await?;
            Ok::<(), QuartziteError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    job = %full_name,
                    endpoint = %node.endpoint,
                    error = %e,
                    "scheduler run job remote error"
                );
            }
            Err(_) => {
                tracing::error!(
                    job = %full_name,
                    endpoint = %node.endpoint,
                    "scheduler run job remote timeout"
                );
            }
        }
    });
}
