use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::ClusterConfig;
use crate::error::{QuartziteError, Result};

/// A cluster member as seen by its peers.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub endpoint_main: String,
    pub endpoint: String,
    pub endpoint_grpc: String,
    pub endpoint_http: String,
    pub queue: String,
    pub mode: String,
    pub health: bool,
    pub register_time: DateTime<Utc>,
    pub last_heartbeat_time: DateTime<Utc>,
}

/// This process's cluster identity and, on the main node, the
/// authoritative peer table.
///
/// Health is heartbeat-based and eventually consistent: workers ping the
/// main on an interval, and a background sweep on the main marks peers
/// unhealthy once they miss three periods.
pub struct ClusterNode {
    /// Cluster RPC address of this node.
    pub endpoint: String,
    pub endpoint_grpc: String,
    pub endpoint_http: String,
    /// Cluster RPC address of the main node; empty on the main itself.
    pub endpoint_main: String,
    pub queue: String,
    pub mode: String,
    heartbeat_interval: Duration,

    peers: RwLock<HashMap<String, NodeRecord>>,
    // Round-robin cursor per queue filter.
    cursors: Mutex<HashMap<String, usize>>,
}

impl ClusterNode {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            endpoint_grpc: config.endpoint_grpc,
            endpoint_http: config.endpoint_http,
            endpoint_main: config.endpoint_main,
            queue: config.queue,
            mode: config.mode,
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
            peers: RwLock::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_main_node(&self) -> bool {
        self.endpoint_main.is_empty() || self.endpoint_main == self.endpoint
    }

    /// This node's own record, as it registers itself with the cluster.
    pub fn self_record(&self) -> NodeRecord {
        let now = Utc::now();
        NodeRecord {
            endpoint_main: self.endpoint_main.clone(),
            endpoint: self.endpoint.clone(),
            endpoint_grpc: self.endpoint_grpc.clone(),
            endpoint_http: self.endpoint_http.clone(),
            queue: self.queue.clone(),
            mode: self.mode.clone(),
            health: true,
            register_time: now,
            last_heartbeat_time: now,
        }
    }

    /// Start the node's background work: the main sweeps peer health,
    /// workers register with the main and then heartbeat forever.
    pub async fn init(self: &Arc<Self>) {
        if self.is_main_node() {
            self.insert_peer(self.self_record()).await;

            let node = self.clone();
            tokio::spawn(async move {
                node.health_sweep_loop().await;
            });
        } else {
            let node = self.clone();
            tokio::spawn(async move {
                node.heartbeat_loop().await;
            });
        }
    }

    /// Main-side `Register`: stamp times, mark healthy, insert or replace,
    /// and echo the caller's canonical record back.
    pub async fn register_node(&self, mut record: NodeRecord) -> NodeRecord {
        let now = Utc::now();
        record.register_time = now;
        record.last_heartbeat_time = now;
        record.health = true;

        tracing::info!(
            endpoint = %record.endpoint,
            queue = %record.queue,
            "cluster node registered"
        );

        self.insert_peer(record.clone()).await;
        record
    }

    /// Main-side `Ping`: refresh the heartbeat. An unknown endpoint is
    /// registered on the spot.
    pub async fn ping_node(&self, record: NodeRecord) -> NodeRecord {
        let mut peers = self.peers.write().await;
        match peers.get_mut(&record.endpoint) {
            Some(peer) => {
                peer.last_heartbeat_time = Utc::now();
                peer.health = true;
                peer.clone()
            }
            None => {
                drop(peers);
                self.register_node(record).await
            }
        }
    }

    /// Healthy peers whose queue matches the filter (an empty filter
    /// matches every queue), round-robin among the survivors.
    pub async fn choice_node(&self, queues: &[String]) -> Result<NodeRecord> {
        let peers = self.peers.read().await;
        let mut eligible: Vec<&NodeRecord> = peers
            .values()
            .filter(|n| n.health && (queues.is_empty() || queues.contains(&n.queue)))
            .collect();

        if eligible.is_empty() {
            return Err(QuartziteError::NoEligibleNode(queues.to_vec()));
        }

        eligible.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));

        let mut key: Vec<String> = queues.to_vec();
        key.sort();

        let mut cursors = self.cursors.lock().await;
        let cursor = cursors.entry(key.join(",")).or_insert(0);
        let chosen = eligible[*cursor % eligible.len()].clone();
        *cursor = (*cursor + 1) % eligible.len();

        Ok(chosen)
    }

    pub async fn peer_records(&self) -> Vec<NodeRecord> {
        let peers = self.peers.read().await;
        let mut records: Vec<NodeRecord> = peers.values().cloned().collect();
        records.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        records
    }

    async fn insert_peer(&self, record: NodeRecord) {
        let mut peers = self.peers.write().await;
        peers.insert(record.endpoint.clone(), record);
    }

    /// Mark peers unhealthy once they miss three heartbeat periods.
    async fn health_sweep_loop(&self) {
        let threshold = self.heartbeat_interval * 3;
        let mut interval = tokio::time::interval(self.heartbeat_interval);

        loop {
            interval.tick().await;

            let now = Utc::now();
            let mut peers = self.peers.write().await;
            for peer in peers.values_mut() {
                if peer.endpoint == self.endpoint {
                    continue;
                }
                let silent = (now - peer.last_heartbeat_time)
                    .to_std()
                    .unwrap_or_default();
                if peer.health && silent > threshold {
                    peer.health = false;
                    tracing::warn!(endpoint = %peer.endpoint, "cluster node unhealthy");
                }
            }
        }
    }

    /// Worker-side loop: register with the main (retrying until it
    /// answers), then ping on every heartbeat interval.
    async fn heartbeat_loop(&self) {
        loop {
            match super::rpc::register(&self.endpoint_main, self.self_record()).await {
                Ok(record) => {
                    tracing::info!(
                        endpoint = %record.endpoint,
                        endpoint_main = %self.endpoint_main,
                        "registered with main node"
                    );
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        endpoint_main = %self.endpoint_main,
                        error = %e,
                        "register with main node failed"
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        let mut interval = tokio::time::interval(self.heartbeat_interval);
        loop {
            interval.tick().await;

            if let Err(e) = super::rpc::ping(&self.endpoint_main, self.self_record()).await {
                tracing::error!(
                    endpoint_main = %self.endpoint_main,
                    error = %e,
                    "ping main node failed"
                );
            }
        }
    }
}
