//! Source retrieval through the `git` command line.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors from a source retriever.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} exited with {status}: {stderr}")]
    Failed {
        command: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

/// Fetches a repository into a local directory.
///
/// Dropping a returned future must stop any work it started.
#[async_trait]
pub trait SourceRetriever: Send + Sync + 'static {
    /// Clone `url` (with submodules) into `dir`, optionally at `branch`.
    async fn clone_repo(
        &self,
        url: &str,
        branch: Option<&str>,
        dir: &Path,
    ) -> Result<(), RetrieveError>;

    /// Check out `commit` in the clone at `dir`.
    async fn checkout(&self, dir: &Path, commit: &str) -> Result<(), RetrieveError>;
}

/// Retriever that shells out to a `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
}

impl GitCli {
    /// The path can be just "git" to use PATH lookup, or a full path.
    pub fn new(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    async fn run(&self, command: &'static str, mut cmd: Command) -> Result<(), RetrieveError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|source| RetrieveError::Spawn {
            program: self.git_path.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(RetrieveError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(command, "git finished");
        Ok(())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl SourceRetriever for GitCli {
    async fn clone_repo(
        &self,
        url: &str,
        branch: Option<&str>,
        dir: &Path,
    ) -> Result<(), RetrieveError> {
        info!(url, branch, dir = %dir.display(), "Cloning repository");

        let mut cmd = Command::new(&self.git_path);
        cmd.arg("clone").arg("--recurse-submodules");
        if let Some(branch) = branch {
            cmd.arg("--branch").arg(branch);
        }
        cmd.arg(url).arg(dir);

        self.run("clone", cmd).await
    }

    async fn checkout(&self, dir: &Path, commit: &str) -> Result<(), RetrieveError> {
        info!(commit, dir = %dir.display(), "Checking out commit");

        let mut cmd = Command::new(&self.git_path);
        cmd.arg("checkout").arg(commit).current_dir(dir);

        self.run("checkout", cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new("/nonexistent/peridot-test-git");

        let err = git
            .clone_repo("https://example.invalid/x.git", None, dir.path())
            .await
            .unwrap_err();
        match err {
            RetrieveError::Spawn { program, .. } => {
                assert_eq!(program, "/nonexistent/peridot-test-git")
            }
            other => panic!("Expected spawn error, got {:?}", other),
        }
    }
}
