//! Peridot agent daemon.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use peridot_agent::payload::idsearcher::SearchSettings;
use peridot_agent::payload::retrieve_github::DEFAULT_HOST_URL;
use peridot_agent::{serve, Config, IdSearcherPayload, NopPayload, RetrieveGithubPayload};

#[derive(Parser)]
#[command(name = "peridot-agent")]
#[command(about = "Peridot job agent")]
#[command(version)]
struct Cli {
    /// Address to listen on (defaults to the agent's well-known port)
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Agent name reported to the controller (defaults to the agent type)
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Configuration string reported to the controller
    #[arg(long, global = true, default_value = "")]
    agent_config: String,

    /// Log filter, e.g. "debug" or "peridot_agent=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    agent: AgentKind,
}

#[derive(Subcommand)]
enum AgentKind {
    /// Test agent that echoes its key/value parameters
    Nop {
        /// Seconds to wait before completing
        #[arg(long, default_value = "2")]
        delay_secs: u64,
    },

    /// Scan the primary code input for SPDX short-form identifiers
    Idsearcher {
        /// Prefix for generated SPDX document namespaces
        #[arg(long, default_value = "https://peridot/primary/idsearcher")]
        namespace_prefix: String,

        /// Path fragment to skip (repeatable)
        #[arg(long = "ignore", default_values_t = vec!["/.git/".to_string()])]
        ignored_paths: Vec<String>,
    },

    /// Clone a GitHub repository into the code output directory
    RetrieveGithub {
        /// Base URL of the git host
        #[arg(long, default_value = DEFAULT_HOST_URL)]
        host_url: String,

        /// Path to the git executable
        #[arg(long, default_value = "git")]
        git: String,
    },
}

impl AgentKind {
    fn agent_type(&self) -> &'static str {
        match self {
            Self::Nop { .. } => "nop",
            Self::Idsearcher { .. } => "idsearcher",
            Self::RetrieveGithub { .. } => "retrieve-github",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::from_default_env().add_directive("peridot=info".parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mut config = Config::for_agent(cli.agent.agent_type()).with_agent_config(cli.agent_config);
    if let Some(bind) = cli.bind {
        config = config.with_bind_addr(bind);
    }
    if let Some(name) = cli.name {
        config = config.with_name(name);
    }

    match cli.agent {
        AgentKind::Nop { delay_secs } => {
            serve(config, NopPayload::new(Duration::from_secs(delay_secs))).await?
        }
        AgentKind::Idsearcher {
            namespace_prefix,
            ignored_paths,
        } => {
            let settings = SearchSettings {
                namespace_prefix,
                ignored_paths,
            };
            serve(config, IdSearcherPayload::new(settings)).await?
        }
        AgentKind::RetrieveGithub { host_url, git } => {
            serve(config, RetrieveGithubPayload::new(host_url, git)).await?
        }
    }

    Ok(())
}
