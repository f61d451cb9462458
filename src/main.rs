use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quartzite::config::{self, ClusterConfig, NodeConfig};
use quartzite::exec;
use quartzite::node::Node;
use quartzite::registry::FuncRegistry;
use quartzite::shutdown::install_shutdown_handler;
use quartzite::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "quartzite")]
#[command(about = "A distributed job scheduler with queue-based cluster dispatch")]
struct Args {
    /// Scheduler gRPC bind address
    #[arg(long, default_value = config::DEFAULT_GRPC_ADDRESS)]
    grpc_address: String,

    /// Scheduler HTTP bind address
    #[arg(long, default_value = config::DEFAULT_HTTP_ADDRESS)]
    http_address: String,

    /// Cluster RPC bind address; setting this joins (or forms) a cluster
    #[arg(long)]
    endpoint: Option<String>,

    /// Main node's cluster RPC address; leave empty to be the main
    #[arg(long, default_value = "")]
    endpoint_main: String,

    /// Queue this node serves
    #[arg(long, default_value = config::DEFAULT_QUEUE)]
    queue: String,

    /// Cluster mode: "active" or "HA"
    #[arg(long, default_value = config::MODE_ACTIVE)]
    mode: String,

    /// Heartbeat period in milliseconds
    #[arg(long, default_value_t = 5000)]
    heartbeat_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let cluster = args.endpoint.as_ref().map(|endpoint| ClusterConfig {
        endpoint: endpoint.clone(),
        endpoint_main: args.endpoint_main.clone(),
        endpoint_grpc: args.grpc_address.clone(),
        endpoint_http: args.http_address.clone(),
        queue: args.queue.clone(),
        mode: args.mode.clone(),
        heartbeat_interval_ms: args.heartbeat_interval_ms,
    });

    let config = NodeConfig {
        grpc_address: args.grpc_address,
        http_address: args.http_address,
        cluster,
    };

    tracing::info!(
        grpc_address = %config.grpc_address,
        http_address = %config.http_address,
        cluster = config.cluster.is_some(),
        "starting quartzite node"
    );

    let registry = FuncRegistry::new();
    exec::register_shell_func(&registry);

    let store = Arc::new(MemoryStore::new());
    let node = Node::new(config, store, registry).await?;

    let shutdown = install_shutdown_handler();
    node.run(shutdown).await?;

    Ok(())
}
