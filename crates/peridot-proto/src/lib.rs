//! Generated gRPC code and converters for the Peridot agent protocol.
//!
//! This crate contains:
//! - Generated protobuf message types
//! - Generated gRPC service stubs (client and server)
//! - Converters between proto types and domain types

pub mod convert;

/// Generated protobuf types and services.
pub mod pb {
    // The path matches the proto package: peridot.agent.v1
    tonic::include_proto!("peridot.agent.v1");
}

// Re-export commonly used types
pub use pb::agent_client::AgentClient;
pub use pb::agent_server::{Agent, AgentServer};
