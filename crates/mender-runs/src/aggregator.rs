//! Folds engine deltas into a run report

use crate::report::{
    AppliedFix, FinalStatus, RunReport, ScoreBreakdown, TimelineEntry, TimelineStatus,
    COMMITS_PER_RUN,
};
use chrono::Utc;
use mender_core::{MenderError, RunStatus, StateDelta};
use std::time::Instant;
use tracing::debug;

/// Consumes the deltas of one run, in order, and maintains its report.
///
/// `final_status` is written at most once. Logs, fixes and elapsed time
/// keep updating until `finish`.
pub struct RunAggregator {
    report: RunReport,
    max_retries: u32,
    started: Instant,
}

impl RunAggregator {
    pub fn new(report: RunReport, max_retries: u32) -> Self {
        Self {
            report,
            max_retries,
            started: Instant::now(),
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Fold one delta into the report
    pub fn apply(&mut self, delta: &StateDelta) -> &RunReport {
        self.report.logs = delta.logs().to_vec();

        if let Some(fixes) = delta.fixes() {
            self.report.fixes_applied = fixes.iter().map(AppliedFix::from).collect();
        }

        if let Some((status, current_retry)) = delta.status() {
            self.record_test_result(status, current_retry);
        }

        self.update_elapsed();
        &self.report
    }

    /// Close the report: settle the status, score it, and record any fault
    pub fn finish(mut self, fault: Option<&MenderError>) -> RunReport {
        if let Some(error) = fault {
            self.report.logs.push(format!("Error: {}", error));
            self.set_final_status(FinalStatus::Failed);
        }
        // A stream that ended without a verdict never passed
        self.set_final_status(FinalStatus::Failed);

        self.update_elapsed();
        self.report.score_breakdown =
            ScoreBreakdown::compute(self.report.run_summary.total_time_seconds, COMMITS_PER_RUN);
        self.report
    }

    fn record_test_result(&mut self, status: RunStatus, current_retry: u32) {
        let Some(outcome) = TimelineStatus::from_run_status(status) else {
            return;
        };

        let iteration = format!("{}/{}", current_retry, self.max_retries);
        let duplicate = self
            .report
            .ci_cd_timeline
            .last()
            .is_some_and(|last| last.same_outcome(&iteration, outcome));
        if duplicate {
            debug!("Skipping duplicate timeline entry {} {:?}", iteration, outcome);
        } else {
            self.report.ci_cd_timeline.push(TimelineEntry {
                iteration,
                status: outcome,
                timestamp: Utc::now(),
            });
        }

        match outcome {
            TimelineStatus::Passed => self.set_final_status(FinalStatus::Passed),
            TimelineStatus::Failed if current_retry > self.max_retries => {
                self.set_final_status(FinalStatus::Failed)
            }
            TimelineStatus::Failed => {}
        }
    }

    /// Only the first verdict sticks
    fn set_final_status(&mut self, status: FinalStatus) {
        let summary = &mut self.report.run_summary;
        if !summary.final_status.is_final() {
            summary.final_status = status;
        }
    }

    fn update_elapsed(&mut self) {
        let elapsed = (self.started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        let summary = &mut self.report.run_summary;
        summary.total_time_seconds = summary.total_time_seconds.max(elapsed);
    }
}
