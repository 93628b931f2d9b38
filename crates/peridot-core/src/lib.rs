//! Peridot Core Domain Types
//!
//! This crate contains the pure domain types shared by every Peridot agent,
//! with no dependencies on:
//! - Network/gRPC
//! - Runtime specifics
//!
//! Everything the controller/agent protocol talks about (job configuration,
//! run/health/cancel status, the aggregate status record and the partial
//! updates that mutate it) lives here.

pub mod error;
pub mod ids;
pub mod identity;
pub mod job;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use identity::AgentIdentity;
pub use ids::JobId;
pub use job::{CodeInput, JobConfig, KeyValue};
pub use status::{AggregateStatus, CancelStatus, HealthStatus, RunStatus, StatusUpdate};
