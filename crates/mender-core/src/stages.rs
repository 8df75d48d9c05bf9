//! Collaborator interfaces for the four run stages
//!
//! Each stage delegates to an external collaborator: cloning and classifying
//! the repository, running its tests in a sandbox, generating a fix, and
//! committing the result. The traits let the engine be driven by mocks in
//! tests and by the real adapter crates in production.

use crate::{Language, MenderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Result of cloning and classifying a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub repo_path: PathBuf,
    pub language: Language,
    pub test_files: Vec<PathBuf>,
}

/// Result of one sandboxed test execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestOutcome {
    /// The suite ran to completion
    Completed { exit_code: i64, logs: String },
    /// The suite could not be run (missing image, unsupported language, runtime down)
    Errored { message: String },
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Completed { exit_code: 0, .. })
    }

    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Self::Completed { exit_code, .. } => Some(*exit_code),
            Self::Errored { .. } => None,
        }
    }

    /// Raw output, or the error text when the suite never ran
    pub fn logs(&self) -> &str {
        match self {
            Self::Completed { logs, .. } => logs,
            Self::Errored { message } => message,
        }
    }
}

/// Status of a version-control finalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitOpStatus {
    Success,
    Failed,
}

impl std::fmt::Display for GitOpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of committing the accumulated fixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub branch: String,
    pub commit: String,
    pub status: GitOpStatus,
}

/// Clones a repository and classifies its source files
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Fails with a transport or filesystem error if the clone fails
    async fn analyze(&self, repository_url: &str) -> Result<Analysis>;

    /// Give back the working tree of a run that is over.
    ///
    /// Called exactly once per successful `analyze`, also when the run
    /// faulted, panicked or hit its deadline. Runs from a drop path, so it
    /// cannot await.
    fn release(&self, _repo_path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Runs a repository's test suite in isolation
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    /// Never fails: runtime problems are reported as `TestOutcome::Errored`
    async fn execute_tests(
        &self,
        repo_path: &Path,
        language: Language,
        test_command: Option<&str>,
    ) -> TestOutcome;
}

/// Produces corrected file content from a failing test log
#[async_trait]
pub trait FixGenerator: Send + Sync {
    async fn generate_fix(
        &self,
        file_content: &str,
        error_log: &str,
        language: Language,
    ) -> Result<String>;
}

/// Commits accumulated fixes to a dedicated branch
#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(
        &self,
        repo_path: &Path,
        branch_name: &str,
        commit_message: &str,
    ) -> Result<FinalizeOutcome>;
}

/// Mock analyzer for testing
pub struct MockAnalyzer {
    analysis: Option<Analysis>,
    calls: AtomicUsize,
    released: Mutex<Vec<PathBuf>>,
}

impl MockAnalyzer {
    pub fn new(analysis: Analysis) -> Self {
        Self {
            analysis: Some(analysis),
            calls: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
        }
    }

    /// An analyzer whose clone always fails
    pub fn failing() -> Self {
        Self {
            analysis: None,
            calls: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Working trees handed back through `release`, in order
    pub fn released(&self) -> Vec<PathBuf> {
        self.released
            .lock()
            .map(|released| released.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, repository_url: &str) -> Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.analysis
            .clone()
            .ok_or_else(|| MenderError::Clone(format!("mock clone of {} failed", repository_url)))
    }

    fn release(&self, repo_path: &Path) -> Result<()> {
        if let Ok(mut released) = self.released.lock() {
            released.push(repo_path.to_path_buf());
        }
        Ok(())
    }
}

/// Mock sandbox replaying scripted outcomes in order.
///
/// The last outcome repeats once the script runs out.
pub struct MockSandbox {
    script: Mutex<VecDeque<TestOutcome>>,
    last: Mutex<Option<TestOutcome>>,
    calls: AtomicUsize,
    commands: Mutex<Vec<Option<String>>>,
}

impl MockSandbox {
    pub fn new(outcomes: impl IntoIterator<Item = TestOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Every execution exits with the given code and logs
    pub fn always(exit_code: i64, logs: &str) -> Self {
        Self::new([TestOutcome::Completed {
            exit_code,
            logs: logs.to_string(),
        }])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Test command override passed on each call
    pub fn commands(&self) -> Vec<Option<String>> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SandboxExecutor for MockSandbox {
    async fn execute_tests(
        &self,
        _repo_path: &Path,
        _language: Language,
        test_command: Option<&str>,
    ) -> TestOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(test_command.map(str::to_string));
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(outcome) = next {
            *last = Some(outcome);
        }
        last.clone().unwrap_or(TestOutcome::Errored {
            message: "mock sandbox has no scripted outcome".to_string(),
        })
    }
}

/// Mock fix generator.
///
/// Scripted responses are consumed in order; once exhausted it echoes the
/// input content back unchanged.
pub struct MockFixGenerator {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: AtomicUsize,
}

impl MockFixGenerator {
    pub fn new(responses: impl IntoIterator<Item = std::result::Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Echo every input back unchanged
    pub fn echo() -> Self {
        Self::new([])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixGenerator for MockFixGenerator {
    async fn generate_fix(
        &self,
        file_content: &str,
        _error_log: &str,
        _language: Language,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        match next {
            Some(Ok(content)) => Ok(content),
            Some(Err(message)) => Err(MenderError::Api(message)),
            None => Ok(file_content.to_string()),
        }
    }
}

/// Mock finalizer recording every commit request
#[derive(Default)]
pub struct MockFinalizer {
    fail: bool,
    commits: Mutex<Vec<(String, String)>>,
}

impl MockFinalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A finalizer whose git commands always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            commits: Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(branch, commit message)` pairs
    pub fn commits(&self) -> Vec<(String, String)> {
        self.commits
            .lock()
            .map(|commits| commits.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Finalizer for MockFinalizer {
    async fn finalize(
        &self,
        _repo_path: &Path,
        branch_name: &str,
        commit_message: &str,
    ) -> Result<FinalizeOutcome> {
        if let Ok(mut commits) = self.commits.lock() {
            commits.push((branch_name.to_string(), commit_message.to_string()));
        }
        if self.fail {
            return Err(MenderError::Git("mock git failure".to_string()));
        }
        Ok(FinalizeOutcome {
            branch: branch_name.to_string(),
            commit: commit_message.to_string(),
            status: GitOpStatus::Success,
        })
    }
}
