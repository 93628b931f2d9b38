//! Error types for the agent runtime.

use thiserror::Error;

/// Errors produced by a task payload.
///
/// The task runner turns every one of these into a single terminal
/// Stopped/Error status update whose message is the error's `Display`.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// A required field is missing or mutually exclusive fields are both set.
    #[error("{0}")]
    Config(String),

    /// A filesystem path cannot be created, accessed, or is not a directory.
    #[error("{0}")]
    Resource(String),

    /// The external collaborator failed.
    #[error("{0}")]
    Collaborator(String),

    /// The job observed a cancel request before finishing.
    #[error("job cancelled")]
    Cancelled,
}

/// Stream read or write failures.
///
/// Never reported to the controller: the affected task stops and the failure
/// propagates as a closed channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading the next controller message failed.
    #[error("Stream read failed: {0}")]
    Read(#[from] tonic::Status),

    /// The outbound stream has been dropped by the transport.
    #[error("Stream closed by controller")]
    Closed,
}

/// Errors that stop the agent server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Invalid bind address.
    #[error("Invalid bind address '{addr}': {source}")]
    InvalidAddr {
        addr: String,
        source: std::net::AddrParseError,
    },

    /// Failed to bind the listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The gRPC server failed.
    #[error("gRPC server error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
