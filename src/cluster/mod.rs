pub mod node;
pub mod rpc;

pub use node::{ClusterNode, NodeRecord};
