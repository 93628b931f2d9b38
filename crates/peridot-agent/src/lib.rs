//! Peridot agent runtime.
//!
//! An agent serves the `Agent.NewJob` bidirectional stream. Every stream is
//! one job, handled by a [`JobCoordinator`] that owns three helper tasks:
//!
//! - the receiver, which reads controller messages,
//! - the sender, which writes describe and status reports,
//! - the task runner, which drives a [`Payload`] once the job is started.
//!
//! The coordinator is the only owner of the job's aggregate status.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod messages;
pub mod payload;
pub mod receiver;
pub mod report;
pub mod runner;
pub mod sender;
pub mod service;

pub use config::Config;
pub use coordinator::JobCoordinator;
pub use error::{PayloadError, ServeError, TransportError};
pub use payload::{IdSearcherPayload, NopPayload, Payload, RetrieveGithubPayload};
pub use service::{serve, serve_with_listener, AgentServiceImpl};
