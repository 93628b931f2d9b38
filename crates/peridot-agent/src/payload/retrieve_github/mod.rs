//! retrieve-github agent: clones a GitHub repository into the job's code
//! output directory.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use peridot_core::JobConfig;

use crate::error::PayloadError;
use crate::payload::Payload;

pub mod git;

pub use git::{GitCli, RetrieveError, SourceRetriever};

pub const DEFAULT_HOST_URL: &str = "https://github.com";

/// A resolved retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievePlan {
    pub url: String,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub dir: PathBuf,
}

#[derive(Clone)]
pub struct RetrieveGithubPayload {
    retriever: Arc<dyn SourceRetriever>,
    host_url: String,
}

impl RetrieveGithubPayload {
    /// Clone from `host_url` using the `git` binary at `git_path`.
    pub fn new(host_url: impl Into<String>, git_path: impl Into<String>) -> Self {
        Self::with_retriever(Arc::new(GitCli::new(git_path)), host_url)
    }

    /// Use a different source retriever.
    pub fn with_retriever(retriever: Arc<dyn SourceRetriever>, host_url: impl Into<String>) -> Self {
        Self {
            retriever,
            host_url: host_url.into(),
        }
    }

    /// URL of `org/repo` on the configured host.
    pub fn repo_url(&self, org: &str, repo: &str) -> String {
        format!("{}/{}/{}.git", self.host_url.trim_end_matches('/'), org, repo)
    }
}

impl Default for RetrieveGithubPayload {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_URL, "git")
    }
}

fn non_empty<'a>(config: &'a JobConfig, key: &str) -> Option<&'a str> {
    config.kv(key).filter(|v| !v.is_empty())
}

#[async_trait]
impl Payload for RetrieveGithubPayload {
    type Plan = RetrievePlan;

    fn agent_type(&self) -> &'static str {
        "retrieve-github"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["codewriter".to_string()]
    }

    fn validate(&self, config: &JobConfig) -> Result<RetrievePlan, PayloadError> {
        let org = non_empty(config, "org");
        let repo = non_empty(config, "repo");
        let branch = non_empty(config, "branch");
        let commit = non_empty(config, "commit");

        let (org, repo) = match (org, repo) {
            (Some(org), Some(repo)) => (org, repo),
            _ => {
                let mut missing = Vec::new();
                if org.is_none() {
                    missing.push("org key/value not specified");
                }
                if repo.is_none() {
                    missing.push("repo key/value not specified");
                }
                return Err(PayloadError::Config(missing.join("; ")));
            }
        };

        if branch.is_some() && commit.is_some() {
            return Err(PayloadError::Config(
                "both commit and branch were specified, but are mutually exclusive".to_string(),
            ));
        }

        if config.code_output_dir.is_empty() {
            return Err(PayloadError::Config(
                "no codeOutputDir specified".to_string(),
            ));
        }

        let dir = PathBuf::from(&config.code_output_dir);
        std::fs::create_dir_all(&dir).map_err(|e| {
            PayloadError::Resource(format!(
                "couldn't create codeOutputDir {}: {}",
                dir.display(),
                e
            ))
        })?;
        let meta = std::fs::metadata(&dir).map_err(|e| {
            PayloadError::Resource(format!(
                "tried to create codeOutputDir {} but path not found: {}",
                dir.display(),
                e
            ))
        })?;
        if !meta.is_dir() {
            return Err(PayloadError::Resource(format!(
                "tried to create codeOutputDir {} but it is not a directory",
                dir.display()
            )));
        }

        Ok(RetrievePlan {
            url: self.repo_url(org, repo),
            branch: branch.map(str::to_string),
            commit: commit.map(str::to_string),
            dir,
        })
    }

    async fn execute(
        &self,
        plan: RetrievePlan,
        cancel: CancellationToken,
    ) -> Result<String, PayloadError> {
        // Dropping the retriever future kills the git child process.
        tokio::select! {
            _ = cancel.cancelled() => return Err(PayloadError::Cancelled),
            result = self.retriever.clone_repo(&plan.url, plan.branch.as_deref(), &plan.dir) => {
                result.map_err(|e| {
                    PayloadError::Collaborator(format!("failed to clone {}: {}", plan.url, e))
                })?;
            }
        }

        if let Some(commit) = &plan.commit {
            tokio::select! {
                _ = cancel.cancelled() => return Err(PayloadError::Cancelled),
                result = self.retriever.checkout(&plan.dir, commit) => {
                    result.map_err(|e| {
                        PayloadError::Collaborator(format!(
                            "failed to check out commit {} after cloning {}: {}",
                            commit, plan.url, e
                        ))
                    })?;
                }
            }
        }

        info!(url = %plan.url, dir = %plan.dir.display(), "Retrieved repository");
        Ok(String::new())
    }
}
