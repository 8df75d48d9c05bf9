//! Core type definitions for Mender runs

use crate::{MenderError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Retry ceiling used when a run does not specify one
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Fix target used when analysis found no test files
pub const UNKNOWN_TARGET: &str = "unknown";

/// Opaque run identifier, generated at trigger time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh random run id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Primary language detected in a cloned repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    #[default]
    Unknown,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::JavaScript => write!(f, "javascript"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "javascript" | "js" | "typescript" | "ts" => Ok(Self::JavaScript),
            "unknown" | "" => Ok(Self::Unknown),
            _ => Err(format!("Invalid language: {}", s)),
        }
    }
}

/// Status of a run as seen by the state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    TestsPassed,
    TestsFailed,
}

impl RunStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::TestsPassed)
    }

    /// Whether this status is a test outcome (and so belongs on the timeline)
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::TestsPassed | Self::TestsFailed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::TestsPassed => write!(f, "tests_passed"),
            Self::TestsFailed => write!(f, "tests_failed"),
        }
    }
}

/// Error category extracted from a failing test log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugType {
    Syntax,
    Indentation,
    Import,
    Logic,
    TypeError,
    Unknown,
}

impl std::fmt::Display for BugType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "SYNTAX"),
            Self::Indentation => write!(f, "INDENTATION"),
            Self::Import => write!(f, "IMPORT"),
            Self::Logic => write!(f, "LOGIC"),
            Self::TypeError => write!(f, "TYPE_ERROR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Outcome of writing a generated fix to disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    #[default]
    Applied,
    Failed,
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One applied fix. Appended to a run, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub file: String,
    #[serde(rename = "type")]
    pub bug_type: BugType,
    pub line: u32,
    pub message: String,
    pub status: FixStatus,
}

impl Fix {
    pub fn new(file: impl Into<String>, bug_type: BugType, line: u32) -> Self {
        Self {
            file: file.into(),
            bug_type,
            line,
            message: format!("Fixed {} error at line {}", bug_type, line),
            status: FixStatus::Applied,
        }
    }

    pub fn with_status(mut self, status: FixStatus) -> Self {
        self.status = status;
        self
    }
}

/// Request to start a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(alias = "github_url")]
    pub repository_url: String,
    pub team_name: String,
    pub leader_name: String,
}

impl RunRequest {
    pub fn new(
        repository_url: impl Into<String>,
        team_name: impl Into<String>,
        leader_name: impl Into<String>,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            team_name: team_name.into(),
            leader_name: leader_name.into(),
        }
    }

    /// Reject requests with blank identifiers
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("repository_url", &self.repository_url),
            ("team_name", &self.team_name),
            ("leader_name", &self.leader_name),
        ] {
            if value.trim().is_empty() {
                return Err(MenderError::Other(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Branch this run's fixes are committed to
    pub fn branch_name(&self) -> String {
        create_branch_name(&self.team_name, &self.leader_name)
    }
}

/// Derive the fix branch name: `TEAM_LEADER_AI_FIX`, upper-cased, spaces as underscores.
///
/// Downstream consumers match on this exact format.
pub fn create_branch_name(team_name: &str, leader_name: &str) -> String {
    format!(
        "{}_{}_AI_FIX",
        team_name.to_uppercase(),
        leader_name.to_uppercase()
    )
    .replace(' ', "_")
}

/// Mutable state of one in-flight run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    pub repo_path: PathBuf,
    pub language: Language,
    pub test_files: Vec<PathBuf>,
    pub max_retries: u32,
    pub current_retry: u32,
    pub fixes: Vec<Fix>,
    pub logs: Vec<String>,
    pub status: RunStatus,
}

impl RunState {
    pub fn new(request: &RunRequest, max_retries: u32) -> Self {
        Self {
            repo_url: request.repository_url.clone(),
            team_name: request.team_name.clone(),
            leader_name: request.leader_name.clone(),
            repo_path: PathBuf::new(),
            language: Language::Unknown,
            test_files: Vec::new(),
            max_retries: max_retries.max(1),
            current_retry: 0,
            fixes: Vec::new(),
            logs: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Most recent log entry, or "" before anything was logged
    pub fn last_log(&self) -> &str {
        self.logs.last().map(String::as_str).unwrap_or("")
    }

    /// True once every permitted fix cycle has been used.
    ///
    /// `current_retry` counts test executions, so after the k-th execution
    /// k-1 fix cycles have completed.
    pub fn retries_exhausted(&self) -> bool {
        self.current_retry > self.max_retries
    }

    /// Fold a stage's delta into this state
    pub fn apply(&mut self, delta: &StateDelta) {
        match delta {
            StateDelta::Analyzed {
                repo_path,
                language,
                test_files,
                logs,
            } => {
                self.repo_path = repo_path.clone();
                self.language = *language;
                self.test_files = test_files.clone();
                self.logs = logs.clone();
            }
            StateDelta::Tested {
                status,
                current_retry,
                logs,
            } => {
                self.status = *status;
                self.current_retry = *current_retry;
                self.logs = logs.clone();
            }
            StateDelta::Fixed { fixes, logs } => {
                self.fixes = fixes.clone();
                self.logs = logs.clone();
            }
            StateDelta::Finalized { logs, .. } => {
                self.logs = logs.clone();
            }
        }
    }
}

/// Fields changed by the most recently completed stage.
///
/// `logs` and `fixes` always carry the complete accumulated sequence, so a
/// consumer can replace rather than append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StateDelta {
    Analyzed {
        repo_path: PathBuf,
        language: Language,
        test_files: Vec<PathBuf>,
        logs: Vec<String>,
    },
    Tested {
        status: RunStatus,
        current_retry: u32,
        logs: Vec<String>,
    },
    Fixed {
        fixes: Vec<Fix>,
        logs: Vec<String>,
    },
    Finalized {
        branch: String,
        logs: Vec<String>,
    },
}

impl StateDelta {
    pub fn logs(&self) -> &[String] {
        match self {
            Self::Analyzed { logs, .. }
            | Self::Tested { logs, .. }
            | Self::Fixed { logs, .. }
            | Self::Finalized { logs, .. } => logs,
        }
    }

    pub fn fixes(&self) -> Option<&[Fix]> {
        match self {
            Self::Fixed { fixes, .. } => Some(fixes),
            _ => None,
        }
    }

    /// Status and retry counter, present only on test results
    pub fn status(&self) -> Option<(RunStatus, u32)> {
        match self {
            Self::Tested {
                status,
                current_retry,
                ..
            } => Some((*status, *current_retry)),
            _ => None,
        }
    }
}
