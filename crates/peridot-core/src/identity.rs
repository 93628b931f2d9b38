//! Static agent identity advertised in describe reports.

/// Identity of an agent process.
///
/// Built once at startup and shared read-only by every job the agent runs,
/// so repeated describe requests always see the same content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Instance name of this agent (e.g. "idsearcher").
    pub name: String,

    /// Agent type tag (e.g. "idsearcher", "retrieve-github").
    pub agent_type: String,

    /// Free-form agent configuration string reported to the controller.
    pub agent_config: String,

    /// Capability tags (e.g. "codereader", "spdxwriter").
    pub capabilities: Vec<String>,
}

impl AgentIdentity {
    /// Create a new identity with no configuration string or capabilities.
    pub fn new(name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_type: agent_type.into(),
            agent_config: String::new(),
            capabilities: Vec::new(),
        }
    }

    /// Builder method to set the agent configuration string.
    pub fn with_agent_config(mut self, agent_config: impl Into<String>) -> Self {
        self.agent_config = agent_config.into();
        self
    }

    /// Builder method to add capabilities.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }
}
