//! End-to-end run scenarios.
//!
//! Each test drives a full run through the engine with mock collaborators
//! and checks the report the registry ends up holding.

use async_trait::async_trait;
use mender_core::{
    Analysis, FixGenerator, Language, MockAnalyzer, MockFinalizer, MockFixGenerator, MockSandbox,
    Result, RunRequest, SandboxExecutor, TestOutcome,
};
use mender_orchestrator::FixLoop;
use mender_runs::{FinalStatus, ReportStore, RunDriver, RunRegistry, TimelineStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn request() -> RunRequest {
    RunRequest::new("https://github.com/acme/app", "team alpha", "jane doe")
}

fn analyzer(repo: &Path, test_files: Vec<PathBuf>) -> Arc<MockAnalyzer> {
    Arc::new(MockAnalyzer::new(Analysis {
        repo_path: repo.to_path_buf(),
        language: Language::Python,
        test_files,
    }))
}

fn driver_with(sandbox: Arc<dyn SandboxExecutor>, analyzer: Arc<MockAnalyzer>) -> RunDriver {
    let fix_loop = FixLoop::new(
        analyzer,
        sandbox,
        Arc::new(MockFixGenerator::echo()),
        Arc::new(MockFinalizer::new()),
    );
    RunDriver::new(fix_loop, RunRegistry::new())
}

/// Sandbox that never finishes within a test's patience
struct HangingSandbox;

#[async_trait]
impl SandboxExecutor for HangingSandbox {
    async fn execute_tests(
        &self,
        _repo_path: &Path,
        _language: Language,
        _test_command: Option<&str>,
    ) -> TestOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        TestOutcome::Completed {
            exit_code: 0,
            logs: String::new(),
        }
    }
}

/// Generator with a bug that takes the run's task down with it
struct PanickingGenerator;

#[async_trait]
impl FixGenerator for PanickingGenerator {
    async fn generate_fix(
        &self,
        _file_content: &str,
        _error_log: &str,
        _language: Language,
    ) -> Result<String> {
        panic!("generator exploded");
    }
}

#[tokio::test]
async fn test_immediate_pass() {
    let dir = tempdir().unwrap();
    let sandbox = Arc::new(MockSandbox::always(0, "5 passed"));
    let driver = driver_with(sandbox.clone(), analyzer(dir.path(), vec![]));

    let (run_id, report) = driver.run(request(), 5).await.unwrap();

    assert_eq!(report.final_status(), FinalStatus::Passed);
    assert!(report.fixes_applied.is_empty());
    assert_eq!(report.ci_cd_timeline.len(), 1);
    assert_eq!(report.ci_cd_timeline[0].iteration, "1/5");
    assert_eq!(report.ci_cd_timeline[0].status, TimelineStatus::Passed);
    assert_eq!(report.run_summary.branch_created, "TEAM_ALPHA_JANE_DOE_AI_FIX");
    assert_eq!(report.score_breakdown.final_total_score, 110);
    assert_eq!(sandbox.calls(), 1);

    // Registry holds the finished report
    assert_eq!(driver.registry().get(&run_id).await.unwrap(), report);
}

#[tokio::test]
async fn test_always_fail_exhausts_budget() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("test_app.py");
    std::fs::write(&target, "assert False\n").unwrap();

    let sandbox = Arc::new(MockSandbox::always(1, "AssertionError at line 1"));
    let driver = driver_with(sandbox.clone(), analyzer(dir.path(), vec![target]));

    let (_, report) = driver.run(request(), 2).await.unwrap();

    assert_eq!(sandbox.calls(), 3);
    assert_eq!(report.fixes_applied.len(), 2);
    assert_eq!(report.final_status(), FinalStatus::Failed);

    let iterations: Vec<&str> = report
        .ci_cd_timeline
        .iter()
        .map(|entry| entry.iteration.as_str())
        .collect();
    assert_eq!(iterations, vec!["1/2", "2/2", "3/2"]);
    assert!(report
        .ci_cd_timeline
        .iter()
        .all(|entry| entry.status == TimelineStatus::Failed));
    assert_eq!(
        report.logs.last().map(String::as_str),
        Some("Git operation: success - TEAM_ALPHA_JANE_DOE_AI_FIX")
    );
}

#[tokio::test]
async fn test_generator_failure_keeps_file_and_continues() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("test_calc.py");
    std::fs::write(&target, "def test_x():\n    assert 1 == 2\n").unwrap();

    let fix_loop = FixLoop::new(
        analyzer(dir.path(), vec![target.clone()]),
        Arc::new(MockSandbox::new([
            TestOutcome::Completed {
                exit_code: 1,
                logs: "AssertionError".into(),
            },
            TestOutcome::Completed {
                exit_code: 0,
                logs: "1 passed".into(),
            },
        ])),
        Arc::new(MockFixGenerator::new([Err("upstream 503".to_string())])),
        Arc::new(MockFinalizer::new()),
    );
    let driver = RunDriver::new(fix_loop, RunRegistry::new());

    let (_, report) = driver.run(request(), 5).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "def test_x():\n    assert 1 == 2\n"
    );
    assert_eq!(report.fixes_applied.len(), 1);
    assert_eq!(report.final_status(), FinalStatus::Passed);
}

#[tokio::test]
async fn test_clone_failure_is_reported() {
    let fix_loop = FixLoop::new(
        Arc::new(MockAnalyzer::failing()),
        Arc::new(MockSandbox::always(0, "")),
        Arc::new(MockFixGenerator::echo()),
        Arc::new(MockFinalizer::new()),
    );
    let driver = RunDriver::new(fix_loop, RunRegistry::new());

    let (_, report) = driver.run(request(), 5).await.unwrap();

    assert_eq!(report.final_status(), FinalStatus::Failed);
    assert!(report
        .logs
        .last()
        .is_some_and(|line| line.starts_with("Error: Clone failed")));
    assert_eq!(report.score_breakdown.base_score, 100);
}

#[tokio::test]
async fn test_deadline_faults_run() {
    let dir = tempdir().unwrap();
    let driver = driver_with(Arc::new(HangingSandbox), analyzer(dir.path(), vec![]))
        .with_timeout(Duration::from_millis(50));

    let (_, report) = driver.run(request(), 5).await.unwrap();

    assert_eq!(report.final_status(), FinalStatus::Failed);
    assert!(report
        .logs
        .iter()
        .any(|line| line.starts_with("Error: Run exceeded deadline")));
    // Analysis completed before the sandbox hung
    assert!(report
        .logs
        .iter()
        .any(|line| line == "Analyzed repo: python, found 0 test files"));
}

#[tokio::test]
async fn test_blank_request_rejected() {
    let dir = tempdir().unwrap();
    let driver = driver_with(
        Arc::new(MockSandbox::always(0, "")),
        analyzer(dir.path(), vec![]),
    );

    let result = driver
        .start(RunRequest::new("https://github.com/a/b", " ", "lead"), 5)
        .await;
    assert!(result.is_err());
    assert!(driver.registry().is_empty().await);
}

#[tokio::test]
async fn test_background_run_becomes_visible() {
    let dir = tempdir().unwrap();
    let results = tempdir().unwrap();
    let driver = driver_with(
        Arc::new(MockSandbox::always(0, "ok")),
        analyzer(dir.path(), vec![]),
    )
    .with_store(ReportStore::new(results.path()));

    let run_id = driver.start(request(), 5).await.unwrap();

    // Readable immediately, before the run finishes
    assert!(driver.registry().get(&run_id).await.is_some());

    let mut report = driver.registry().get(&run_id).await.unwrap();
    for _ in 0..200 {
        if report.final_status().is_final() && results.path().join(format!("results_{}.json", run_id)).exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        report = driver.registry().get(&run_id).await.unwrap();
    }
    assert_eq!(report.final_status(), FinalStatus::Passed);

    let saved = ReportStore::new(results.path())
        .load(&run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.run_summary.final_status, FinalStatus::Passed);
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let mut run_ids = Vec::new();
    let registry = RunRegistry::new();
    let dirs: Vec<_> = (0..4).map(|_| tempdir().unwrap()).collect();

    for (i, dir) in dirs.iter().enumerate() {
        let exit_code = if i % 2 == 0 { 0 } else { 1 };
        let fix_loop = FixLoop::new(
            analyzer(dir.path(), vec![]),
            Arc::new(MockSandbox::always(exit_code, "log")),
            Arc::new(MockFixGenerator::echo()),
            Arc::new(MockFinalizer::new()),
        );
        let driver = RunDriver::new(fix_loop, registry.clone());
        let request = RunRequest::new(format!("https://github.com/acme/r{}", i), "t", "l");
        run_ids.push(driver.start(request, 1).await.unwrap());
    }

    for _ in 0..200 {
        let mut done = 0;
        for run_id in &run_ids {
            if registry.get(run_id).await.unwrap().final_status().is_final() {
                done += 1;
            }
        }
        if done == run_ids.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for (i, run_id) in run_ids.iter().enumerate() {
        let report = registry.get(run_id).await.unwrap();
        assert_eq!(
            report.run_summary.repository_url,
            format!("https://github.com/acme/r{}", i)
        );
        let expected = if i % 2 == 0 {
            FinalStatus::Passed
        } else {
            FinalStatus::Failed
        };
        assert_eq!(report.final_status(), expected);
    }
}

#[tokio::test]
async fn test_panicking_collaborator_still_finishes_report() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("test_app.py");
    std::fs::write(&target, "assert False\n").unwrap();

    let analyzer = analyzer(dir.path(), vec![target]);
    let fix_loop = FixLoop::new(
        analyzer.clone(),
        Arc::new(MockSandbox::always(1, "AssertionError")),
        Arc::new(PanickingGenerator),
        Arc::new(MockFinalizer::new()),
    );
    let driver = RunDriver::new(fix_loop, RunRegistry::new());

    let run_id = driver.start(request(), 3).await.unwrap();

    let mut report = driver.registry().get(&run_id).await.unwrap();
    for _ in 0..200 {
        if report.final_status().is_final() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        report = driver.registry().get(&run_id).await.unwrap();
    }

    assert_eq!(report.final_status(), FinalStatus::Failed);
    assert_eq!(
        report.logs.last().map(String::as_str),
        Some("Error: Run panicked: generator exploded")
    );
    assert_eq!(report.score_breakdown.base_score, 100);
    // The checkout is released even though the stream never finished
    assert_eq!(analyzer.released(), vec![dir.path().to_path_buf()]);
}

#[tokio::test]
async fn test_checkout_released_after_each_run() {
    let dir = tempdir().unwrap();
    let analyzer = analyzer(dir.path(), vec![]);
    let driver = driver_with(Arc::new(MockSandbox::always(0, "ok")), analyzer.clone());

    for _ in 0..3 {
        driver.run(request(), 5).await.unwrap();
    }

    assert_eq!(analyzer.calls(), 3);
    assert_eq!(analyzer.released().len(), 3);
}

#[tokio::test]
async fn test_deadline_releases_checkout() {
    let dir = tempdir().unwrap();
    let analyzer = analyzer(dir.path(), vec![]);
    let driver = driver_with(Arc::new(HangingSandbox), analyzer.clone())
        .with_timeout(Duration::from_millis(50));

    driver.run(request(), 5).await.unwrap();

    assert_eq!(analyzer.released(), vec![dir.path().to_path_buf()]);
}
