//! # mender-runs
//!
//! Everything that happens to a run outside the engine itself.
//!
//! This crate provides:
//! - `RunReport`, the document served by the status endpoint and written to disk
//! - `RunAggregator`, which folds engine deltas into a report
//! - `RunRegistry`, the process-wide map of live reports
//! - `ReportStore`, best-effort JSON persistence of finished reports
//! - `RunDriver`, which starts runs and wires the pieces together

mod aggregator;
mod driver;
mod registry;
mod report;
mod storage;

pub use aggregator::RunAggregator;
pub use driver::RunDriver;
pub use registry::{RunHandle, RunRegistry};
pub use report::{
    AppliedFix, FinalStatus, RunReport, RunSummary, ScoreBreakdown, TimelineEntry, TimelineStatus,
    BASE_SCORE, COMMITS_PER_RUN, SPEED_BONUS, SPEED_BONUS_THRESHOLD_SECS,
};
pub use storage::ReportStore;
