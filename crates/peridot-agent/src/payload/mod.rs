//! Task payloads: the work an agent performs for one job.
//!
//! Every payload shares the same protocol skeleton; only the implementation
//! of [`Payload`] differs between agents.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use peridot_core::{AgentIdentity, JobConfig};

use crate::error::PayloadError;

pub mod idsearcher;
pub mod nop;
pub mod retrieve_github;

pub use idsearcher::IdSearcherPayload;
pub use nop::NopPayload;
pub use retrieve_github::RetrieveGithubPayload;

/// Task-specific work invoked by the task runner.
///
/// The runner calls [`validate`](Payload::validate) first; only if it
/// succeeds is the job reported as running and
/// [`execute`](Payload::execute) called.
#[async_trait]
pub trait Payload: Send + Sync + 'static {
    /// Everything `execute` needs, extracted from the job configuration.
    type Plan: Send + 'static;

    /// Agent type tag advertised in describe reports.
    fn agent_type(&self) -> &'static str;

    /// Capability tags advertised in describe reports.
    fn capabilities(&self) -> Vec<String>;

    /// Check the configuration fields this payload needs.
    fn validate(&self, config: &JobConfig) -> Result<Self::Plan, PayloadError>;

    /// Do the work. Returns output text to report on success.
    ///
    /// Implementations check `cancel` at collaborator boundaries and return
    /// [`PayloadError::Cancelled`] once they observe it.
    async fn execute(
        &self,
        plan: Self::Plan,
        cancel: CancellationToken,
    ) -> Result<String, PayloadError>;

    /// Identity for an agent running this payload.
    fn identity(&self, name: &str, agent_config: &str) -> AgentIdentity {
        AgentIdentity::new(name, self.agent_type())
            .with_agent_config(agent_config)
            .with_capabilities(self.capabilities())
    }
}
