//! Git command execution abstraction

use async_trait::async_trait;
use mender_core::{MenderError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Output;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Output from a git command
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(stderr: &str) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: false,
        }
    }
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }
}

/// Trait for executing git commands in a working tree (allows mocking in tests)
#[async_trait]
pub trait GitExecutor: Send + Sync {
    async fn exec(&self, repo_path: &Path, args: &[&str]) -> Result<GitOutput>;
}

/// Real git command executor
#[derive(Debug, Clone)]
pub struct GitCommand {
    binary: String,
}

impl GitCommand {
    pub fn new() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitExecutor for GitCommand {
    #[instrument(skip(self), fields(repo = %repo_path.display()))]
    async fn exec(&self, repo_path: &Path, args: &[&str]) -> Result<GitOutput> {
        debug!("Executing git {:?}", args);

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(repo_path)
            .output()
            .await
            .map_err(|e| MenderError::Git(format!("Failed to execute git: {}", e)))?;

        let git_output = GitOutput::from(output);
        if !git_output.success {
            debug!("git command failed: {}", git_output.stderr);
        }

        Ok(git_output)
    }
}

/// Mock git executor for testing
#[derive(Default)]
pub struct MockGitExecutor {
    responses: HashMap<String, GitOutput>,
    calls: Mutex<Vec<String>>,
}

impl MockGitExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to the exact argument list `command` (space-joined)
    pub fn with_response(mut self, command: &str, output: GitOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GitExecutor for MockGitExecutor {
    async fn exec(&self, _repo_path: &Path, args: &[&str]) -> Result<GitOutput> {
        let key = args.join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }
        self.responses
            .get(&key)
            .cloned()
            .ok_or_else(|| MenderError::Git(format!("No mock response for: {}", key)))
    }
}
