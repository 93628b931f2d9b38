//! Agent server configuration.

/// Agent server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the gRPC server listens on.
    pub bind_addr: String,

    /// Agent name advertised in describe reports.
    pub name: String,

    /// Free-form configuration string advertised in describe reports.
    pub agent_config: String,
}

impl Config {
    /// Defaults for an agent of the given type.
    pub fn for_agent(agent_type: &str) -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", default_port(agent_type)),
            name: agent_type.to_string(),
            agent_config: String::new(),
        }
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_agent_config(mut self, agent_config: impl Into<String>) -> Self {
        self.agent_config = agent_config.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_agent("nop")
    }
}

/// Well-known listening port for each agent type.
pub fn default_port(agent_type: &str) -> u16 {
    match agent_type {
        "idsearcher" => 9001,
        "retrieve-github" => 9002,
        _ => 9003,
    }
}
