//! Core domain errors.

use thiserror::Error;

use crate::RunStatus;

/// Core domain errors for Peridot agents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status update tried to move the run state backwards.
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: RunStatus, to: RunStatus },
}
