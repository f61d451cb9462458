pub const DEFAULT_GRPC_ADDRESS: &str = "127.0.0.1:36360";
pub const DEFAULT_HTTP_ADDRESS: &str = "127.0.0.1:36370";
pub const DEFAULT_CLUSTER_RPC_ADDRESS: &str = "127.0.0.1:36380";
pub const DEFAULT_CLUSTER_HTTP_ADDRESS: &str = "127.0.0.1:36390";

pub const DEFAULT_QUEUE: &str = "default";
pub const MODE_ACTIVE: &str = "active";
pub const MODE_HA: &str = "HA";

/// Settings for one scheduler node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Scheduler gRPC surface bind address.
    pub grpc_address: String,
    /// Scheduler HTTP gateway bind address.
    pub http_address: String,
    /// Present only when the node joins a cluster.
    pub cluster: Option<ClusterConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            grpc_address: DEFAULT_GRPC_ADDRESS.to_string(),
            http_address: DEFAULT_HTTP_ADDRESS.to_string(),
            cluster: None,
        }
    }
}

impl NodeConfig {
    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = Some(cluster);
        self
    }
}

/// Cluster identity and peers' view of this node.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Cluster RPC bind address; this is the node's identity in the
    /// peer table.
    pub endpoint: String,
    /// Main node's cluster RPC address. Empty on the main itself.
    pub endpoint_main: String,
    /// Scheduler gRPC address advertised to peers.
    pub endpoint_grpc: String,
    /// Scheduler HTTP address advertised to peers.
    pub endpoint_http: String,
    pub queue: String,
    /// `active` or `HA`.
    pub mode: String,
    pub heartbeat_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CLUSTER_RPC_ADDRESS.to_string(),
            endpoint_main: String::new(),
            endpoint_grpc: DEFAULT_GRPC_ADDRESS.to_string(),
            endpoint_http: DEFAULT_HTTP_ADDRESS.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            mode: MODE_ACTIVE.to_string(),
            heartbeat_interval_ms: 5000,
        }
    }
}

impl ClusterConfig {
    pub fn with_main(mut self, endpoint_main: &str) -> Self {
        self.endpoint_main = endpoint_main.to_string();
        self
    }

    pub fn with_queue(mut self, queue: &str) -> Self {
        self.queue = queue.to_string();
        self
    }
}
