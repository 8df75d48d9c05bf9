//! Branch, commit and optional push of a run's fixes

use crate::command::{GitCommand, GitExecutor, GitOutput};
use async_trait::async_trait;
use mender_core::config::GitConfig;
use mender_core::{FinalizeOutcome, Finalizer, GitOpStatus, MenderError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Author recorded on fix commits
const AUTHOR_NAME: &str = "mender";
const AUTHOR_EMAIL: &str = "mender@localhost";

/// Commits everything in the working tree to a new branch.
///
/// Runs with no applied fixes still get a (possibly empty) commit, so every
/// finalized run leaves its branch behind.
#[derive(Clone)]
pub struct GitFinalizer {
    git: Arc<dyn GitExecutor>,
    config: GitConfig,
}

impl GitFinalizer {
    pub fn new(git: Arc<dyn GitExecutor>, config: GitConfig) -> Self {
        Self { git, config }
    }

    pub fn from_config(config: &GitConfig) -> Self {
        Self::new(Arc::new(GitCommand::new()), config.clone())
    }

    async fn run(&self, repo_path: &Path, args: &[&str]) -> Result<GitOutput> {
        let output = self.git.exec(repo_path, args).await?;
        if !output.success {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            let subcommand = args
                .iter()
                .find(|arg| !arg.starts_with('-') && !arg.contains('='))
                .copied()
                .unwrap_or_default();
            return Err(MenderError::Git(format!(
                "git {} failed: {}",
                subcommand, detail
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl Finalizer for GitFinalizer {
    async fn finalize(
        &self,
        repo_path: &Path,
        branch_name: &str,
        commit_message: &str,
    ) -> Result<FinalizeOutcome> {
        self.run(repo_path, &["checkout", "-b", branch_name]).await?;
        self.run(repo_path, &["add", "-A"]).await?;

        let user_name = format!("user.name={}", AUTHOR_NAME);
        let user_email = format!("user.email={}", AUTHOR_EMAIL);
        self.run(
            repo_path,
            &[
                "-c",
                &user_name,
                "-c",
                &user_email,
                "commit",
                "--allow-empty",
                "-m",
                commit_message,
            ],
        )
        .await?;

        if self.config.push {
            self.run(repo_path, &["push", "-u", &self.config.remote, branch_name])
                .await?;
            info!("Pushed {} to {}", branch_name, self.config.remote);
        }

        info!("Committed '{}' on {}", commit_message, branch_name);
        Ok(FinalizeOutcome {
            branch: branch_name.to_string(),
            commit: commit_message.to_string(),
            status: GitOpStatus::Success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockGitExecutor;
    use std::process::Command;
    use tempfile::tempdir;

    const COMMIT: &str = "-c user.name=mender -c user.email=mender@localhost commit --allow-empty -m [AI-AGENT] Applied 2 fixes";

    fn mock() -> MockGitExecutor {
        MockGitExecutor::new()
            .with_response("checkout -b T_L_AI_FIX", GitOutput::ok(""))
            .with_response("add -A", GitOutput::ok(""))
            .with_response(COMMIT, GitOutput::ok("[T_L_AI_FIX abc123]"))
    }

    #[tokio::test]
    async fn test_finalize_without_push() {
        let git = Arc::new(mock());
        let finalizer = GitFinalizer::new(git.clone(), GitConfig::default());

        let outcome = finalizer
            .finalize(Path::new("/repo"), "T_L_AI_FIX", "[AI-AGENT] Applied 2 fixes")
            .await
            .unwrap();

        assert_eq!(outcome.status, GitOpStatus::Success);
        assert_eq!(outcome.branch, "T_L_AI_FIX");
        assert_eq!(outcome.commit, "[AI-AGENT] Applied 2 fixes");
        assert_eq!(git.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_finalize_with_push() {
        let git = Arc::new(
            mock().with_response("push -u upstream T_L_AI_FIX", GitOutput::ok("")),
        );
        let config = GitConfig {
            push: true,
            remote: "upstream".to_string(),
        };
        let finalizer = GitFinalizer::new(git.clone(), config);

        finalizer
            .finalize(Path::new("/repo"), "T_L_AI_FIX", "[AI-AGENT] Applied 2 fixes")
            .await
            .unwrap();
        assert_eq!(git.calls().last().unwrap(), "push -u upstream T_L_AI_FIX");
    }

    #[tokio::test]
    async fn test_checkout_failure_stops_early() {
        let git = Arc::new(MockGitExecutor::new().with_response(
            "checkout -b T_L_AI_FIX",
            GitOutput::failed("fatal: a branch named 'T_L_AI_FIX' already exists"),
        ));
        let finalizer = GitFinalizer::new(git.clone(), GitConfig::default());

        let err = finalizer
            .finalize(Path::new("/repo"), "T_L_AI_FIX", "m")
            .await
            .unwrap_err();

        assert!(matches!(err, MenderError::Git(ref msg) if msg.contains("already exists")));
        assert_eq!(git.calls().len(), 1);
    }

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_real_repository() {
        if !git_available() {
            println!("git not installed, skipping");
            return;
        }

        let dir = tempdir().unwrap();
        let init = Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        assert!(init.success());
        std::fs::write(dir.path().join("test_app.py"), "assert True\n").unwrap();

        let finalizer = GitFinalizer::from_config(&GitConfig::default());
        let outcome = finalizer
            .finalize(dir.path(), "TEAM_LEAD_AI_FIX", "[AI-AGENT] Applied 1 fixes")
            .await
            .unwrap();
        assert_eq!(outcome.status, GitOpStatus::Success);

        let head = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&head.stdout).trim(), "TEAM_LEAD_AI_FIX");

        let log = Command::new("git")
            .args(["log", "-1", "--format=%s"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&log.stdout).trim(),
            "[AI-AGENT] Applied 1 fixes"
        );
    }
}
