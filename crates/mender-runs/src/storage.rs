//! Report persistence
//!
//! Finished reports are written as pretty JSON to `results_{run_id}.json`
//! in the configured results directory. Nothing is read back at startup.

use crate::report::RunReport;
use mender_core::{MenderError, Result, RunId};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Writes one JSON document per finished run
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("results_{}.json", run_id))
    }

    /// Write the report, replacing any earlier document for the run
    pub async fn save(&self, run_id: &RunId, report: &RunReport) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(report)?;
        let path = self.path_for(run_id);

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            MenderError::Persistence(format!("creating {}: {}", self.dir.display(), e))
        })?;
        fs::write(&path, json)
            .await
            .map_err(|e| MenderError::Persistence(format!("writing {}: {}", path.display(), e)))?;

        debug!("Stored report for run {} at {:?}", run_id, path);
        Ok(path)
    }

    pub async fn load(&self, run_id: &RunId) -> Result<Option<RunReport>> {
        let path = self.path_for(run_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FinalStatus;
    use mender_core::RunRequest;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("results"));
        let run_id = RunId::from("abc");

        let mut report = RunReport::new(&RunRequest::new("https://github.com/a/b", "t", "l"));
        report.run_summary.final_status = FinalStatus::Passed;

        let path = store.save(&run_id, &report).await.unwrap();
        assert_eq!(path, dir.path().join("results").join("results_abc.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"run_summary\""));

        let loaded = store.load(&run_id).await.unwrap().unwrap();
        assert_eq!(loaded, report);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        assert!(store.load(&RunId::from("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_to_unwritable_location_errors() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = ReportStore::new(blocker.join("nested"));
        let report = RunReport::new(&RunRequest::new("u", "t", "l"));
        let result = store.save(&RunId::from("x"), &report).await;
        assert!(matches!(result, Err(MenderError::Persistence(_))));
    }
}
