//! Process-wide registry of run reports

use crate::report::RunReport;
use mender_core::RunId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type Reports = Arc<RwLock<HashMap<RunId, RunReport>>>;

/// Concurrency-safe map from run id to the latest report snapshot.
///
/// Anyone holding a clone may read. Writes go through the `RunHandle`
/// returned by `create`, one per run.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Reports,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the initial report and hand back the run's only writer
    pub async fn create(&self, run_id: RunId, report: RunReport) -> RunHandle {
        let mut runs = self.runs.write().await;
        runs.insert(run_id.clone(), report);
        debug!("Registered run {}", run_id);

        RunHandle {
            run_id,
            runs: Arc::clone(&self.runs),
        }
    }

    /// Snapshot of a run's report, possibly mid-run
    pub async fn get(&self, run_id: &RunId) -> Option<RunReport> {
        let runs = self.runs.read().await;
        runs.get(run_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

/// Exclusive write access to one registry entry. Deliberately not `Clone`.
pub struct RunHandle {
    run_id: RunId,
    runs: Reports,
}

impl RunHandle {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Replace the stored snapshot
    pub async fn publish(&self, report: &RunReport) {
        let mut runs = self.runs.write().await;
        runs.insert(self.run_id.clone(), report.clone());
    }
}
