//! Run report document
//!
//! Field names are the snake_case spellings the dashboard reads.

use chrono::{DateTime, Utc};
use mender_core::{BugType, Fix, FixStatus, RunRequest, RunStatus};
use serde::{Deserialize, Serialize};

/// Score every run starts from
pub const BASE_SCORE: i64 = 100;

/// Bonus for finishing under the speed threshold
pub const SPEED_BONUS: i64 = 10;

pub const SPEED_BONUS_THRESHOLD_SECS: f64 = 300.0;

/// Commits free of efficiency penalty
const FREE_COMMITS: i64 = 20;

/// Penalty per commit above the free allowance
const PENALTY_PER_COMMIT: i64 = 2;

/// Every run squashes its fixes into one commit
pub const COMMITS_PER_RUN: u32 = 1;

/// Overall run outcome. Written once: leaves `Running` at most one time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalStatus {
    #[default]
    Running,
    Passed,
    Failed,
}

impl FinalStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub repository_url: String,
    pub team_name: String,
    pub leader_name: String,
    pub branch_created: String,
    pub final_status: FinalStatus,
    pub total_time_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: i64,
    pub speed_bonus: i64,
    pub efficiency_penalty: i64,
    pub final_total_score: i64,
}

impl Default for ScoreBreakdown {
    /// Shown while a run is in flight: the base score, nothing earned or lost yet
    fn default() -> Self {
        Self {
            base_score: BASE_SCORE,
            speed_bonus: 0,
            efficiency_penalty: 0,
            final_total_score: BASE_SCORE,
        }
    }
}

impl ScoreBreakdown {
    /// Score a finished run
    pub fn compute(total_time_seconds: f64, commit_count: u32) -> Self {
        let speed_bonus = if total_time_seconds < SPEED_BONUS_THRESHOLD_SECS {
            SPEED_BONUS
        } else {
            0
        };
        let efficiency_penalty =
            ((i64::from(commit_count) - FREE_COMMITS) * PENALTY_PER_COMMIT).max(0);

        Self {
            base_score: BASE_SCORE,
            speed_bonus,
            efficiency_penalty,
            final_total_score: BASE_SCORE + speed_bonus - efficiency_penalty,
        }
    }
}

/// A fix as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub file: String,
    pub bug_type: BugType,
    pub line_number: u32,
    pub commit_message: String,
    pub status: FixStatus,
}

impl From<&Fix> for AppliedFix {
    fn from(fix: &Fix) -> Self {
        Self {
            file: fix.file.clone(),
            bug_type: fix.bug_type,
            line_number: fix.line,
            commit_message: fix.message.clone(),
            status: fix.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimelineStatus {
    Passed,
    Failed,
}

impl TimelineStatus {
    /// Normalize a test outcome. `None` for statuses that are not outcomes.
    pub fn from_run_status(status: RunStatus) -> Option<Self> {
        match status {
            RunStatus::TestsPassed => Some(Self::Passed),
            RunStatus::TestsFailed => Some(Self::Failed),
            RunStatus::Running => None,
        }
    }
}

/// One test execution on the CI/CD timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// `"{current_retry}/{max_retries}"`
    pub iteration: String,
    pub status: TimelineStatus,
    pub timestamp: DateTime<Utc>,
}

impl TimelineEntry {
    /// Same iteration and outcome, ignoring the timestamp
    pub fn same_outcome(&self, iteration: &str, status: TimelineStatus) -> bool {
        self.iteration == iteration && self.status == status
    }
}

/// Queryable report for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_summary: RunSummary,
    pub score_breakdown: ScoreBreakdown,
    pub fixes_applied: Vec<AppliedFix>,
    pub ci_cd_timeline: Vec<TimelineEntry>,
    pub logs: Vec<String>,
}

impl RunReport {
    /// Initial report, created when the run is triggered
    pub fn new(request: &RunRequest) -> Self {
        Self {
            run_summary: RunSummary {
                repository_url: request.repository_url.clone(),
                team_name: request.team_name.clone(),
                leader_name: request.leader_name.clone(),
                branch_created: request.branch_name(),
                final_status: FinalStatus::Running,
                total_time_seconds: 0.0,
            },
            score_breakdown: ScoreBreakdown::default(),
            fixes_applied: Vec::new(),
            ci_cd_timeline: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn final_status(&self) -> FinalStatus {
        self.run_summary.final_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_law() {
        let fast = ScoreBreakdown::compute(250.0, COMMITS_PER_RUN);
        assert_eq!(fast.speed_bonus, 10);
        assert_eq!(fast.efficiency_penalty, 0);
        assert_eq!(fast.final_total_score, 110);

        let slow = ScoreBreakdown::compute(400.0, COMMITS_PER_RUN);
        assert_eq!(slow.speed_bonus, 0);
        assert_eq!(slow.final_total_score, 100);

        // Threshold is exclusive
        assert_eq!(ScoreBreakdown::compute(300.0, 1).speed_bonus, 0);
    }

    #[test]
    fn test_efficiency_penalty() {
        assert_eq!(ScoreBreakdown::compute(10.0, 20).efficiency_penalty, 0);
        let score = ScoreBreakdown::compute(10.0, 25);
        assert_eq!(score.efficiency_penalty, 10);
        assert_eq!(score.final_total_score, 100);
    }

    #[test]
    fn test_new_report_wire_format() {
        let request = RunRequest::new("https://github.com/a/b", "team alpha", "jane doe");
        let report = RunReport::new(&request);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["run_summary"]["final_status"], "RUNNING");
        assert_eq!(
            json["run_summary"]["branch_created"],
            "TEAM_ALPHA_JANE_DOE_AI_FIX"
        );
        assert_eq!(json["run_summary"]["repository_url"], "https://github.com/a/b");
        assert!(json["fixes_applied"].as_array().unwrap().is_empty());
        assert!(json["ci_cd_timeline"].as_array().unwrap().is_empty());
        assert_eq!(
            json["score_breakdown"],
            serde_json::json!({
                "base_score": 100,
                "speed_bonus": 0,
                "efficiency_penalty": 0,
                "final_total_score": 100
            })
        );
    }

    #[test]
    fn test_applied_fix_field_names() {
        let fix = Fix::new("tests/test_app.py", BugType::Import, 4);
        let json = serde_json::to_value(AppliedFix::from(&fix)).unwrap();

        assert_eq!(json["bug_type"], "IMPORT");
        assert_eq!(json["line_number"], 4);
        assert_eq!(json["commit_message"], "Fixed IMPORT error at line 4");
        assert_eq!(json["status"], "applied");
    }

    #[test]
    fn test_timeline_status_normalization() {
        assert_eq!(
            TimelineStatus::from_run_status(RunStatus::TestsPassed),
            Some(TimelineStatus::Passed)
        );
        assert_eq!(
            TimelineStatus::from_run_status(RunStatus::TestsFailed),
            Some(TimelineStatus::Failed)
        );
        assert_eq!(TimelineStatus::from_run_status(RunStatus::Running), None);
    }
}
