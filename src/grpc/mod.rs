pub mod cluster_service;
pub mod convert;
pub mod scheduler_service;
pub mod server;

use tonic::Status;

use crate::error::QuartziteError;

pub use server::{ClusterRpcServer, GrpcService};

/// Map domain errors onto gRPC status codes.
pub(crate) fn status_from(err: QuartziteError) -> Status {
    match err {
        QuartziteError::JobNotFound(_) => Status::not_found(err.to_string()),
        QuartziteError::FuncUnregistered(_)
        | QuartziteError::InvalidSpec { .. }
        | QuartziteError::JobTimeout { .. } => Status::invalid_argument(err.to_string()),
        QuartziteError::NoEligibleNode(_) => Status::failed_precondition(err.to_string()),
        QuartziteError::Store(_) | QuartziteError::Internal(_) => Status::internal(err.to_string()),
        QuartziteError::Rpc(status) => status,
        QuartziteError::Transport(_) => Status::unavailable(err.to_string()),
    }
}
