//! Error types for the directory fetch and the query path

use shared::DecodeError;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Failures of a directory fetch, returned to the caller
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Could not resolve {host}: {reason}")]
    HostResolution { host: String, reason: String },

    #[error("Directory connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Directory did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Server list cut short: record declared {declared} bytes, got {available}")]
    PartialList { declared: u32, available: usize },

    #[error(transparent)]
    InvalidRecord(#[from] DecodeError),
}

/// Per-datagram outcome handed to a consumer; never fatal to the dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Bad reply from {from}: {source}")]
    Decode { from: SocketAddr, source: DecodeError },

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("No reply from {target} within {waited:?}")]
    Timeout { target: SocketAddr, waited: Duration },
}

/// Misuse of the dispatcher lifecycle
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dispatcher is not listening yet")]
    NotListening,

    #[error("Dispatcher is already listening")]
    AlreadyListening,

    #[error("Dispatcher has been closed")]
    Closed,
}
