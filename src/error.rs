use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuartziteError {
    #[error("job `{0}` not found")]
    JobNotFound(String),

    #[error("job func `{0}` unregistered")]
    FuncUnregistered(String),

    #[error("job `{job}` {field} `{value}` error: {detail}")]
    InvalidSpec {
        job: String,
        field: &'static str,
        value: String,
        detail: String,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("job `{job}` timeout `{timeout}` error: {detail}")]
    JobTimeout {
        job: String,
        timeout: String,
        detail: String,
    },

    #[error("cluster node with queue `{0:?}` does not exist")]
    NoEligibleNode(Vec<String>),

    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

pub type Result<T> = std::result::Result<T, QuartziteError>;
