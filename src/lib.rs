pub mod cluster;
pub mod config;
pub mod error;
pub mod exec;
pub mod grpc;
pub mod http;
pub mod job;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod store;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("quartzite");
}

pub use error::{QuartziteError, Result};
pub use job::{Job, JobKind, JobStatus};
pub use registry::FuncRegistry;
pub use scheduler::Scheduler;
pub use store::{MemoryStore, Store};
