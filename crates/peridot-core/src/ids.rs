//! Newtype wrappers for identifiers to ensure type safety.

use std::fmt;
use uuid::Uuid;

/// Identifier for one job, i.e. one stream lifetime on an agent.
///
/// The wire protocol carries no job identifier; agents generate one per
/// stream so that log lines from the coordinator, receiver, sender and task
/// runner of the same job can be correlated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Generate a new random JobId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
