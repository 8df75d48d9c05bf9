//! Fix loop engine - drives one run from analysis to finalization
//!
//! The engine owns the run's `RunState` and walks the state machine,
//! invoking one collaborator per stage. Every completed stage produces a
//! `StateDelta` which is applied to the local state and yielded to the
//! caller.
//!
//! The returned stream is lazy: the next stage does not start until the
//! consumer polls for the next delta, so a consumer that folds each delta
//! before polling again sees stages strictly in order.

use crate::fixer::{classify_error, extract_line_number, select_target};
use crate::state_machine::{transition, Action, Event, Stage};
use async_stream::try_stream;
use futures::stream::{Stream, StreamExt};
use mender_core::fail_open::fail_open_sync;
use mender_core::{
    create_branch_name, Analyzer, BugType, Finalizer, Fix, FixGenerator, FixStatus, GitOpStatus,
    Language, MenderError, Result, RunState, RunStatus, SandboxExecutor, StateDelta, TestOutcome,
    UNKNOWN_TARGET,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of every commit the finalizer creates
pub const COMMIT_MESSAGE_PREFIX: &str = "[AI-AGENT]";

/// Hands a run's working tree back to the analyzer when dropped, whether
/// the stream finished or was abandoned mid-stage.
struct Checkout {
    analyzer: Arc<dyn Analyzer>,
    repo_path: PathBuf,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        debug!("Releasing checkout {:?}", self.repo_path);
        fail_open_sync("checkout_release", self.analyzer.release(&self.repo_path));
    }
}

/// Engine for running the fix-verify loop
#[derive(Clone)]
pub struct FixLoop {
    analyzer: Arc<dyn Analyzer>,
    sandbox: Arc<dyn SandboxExecutor>,
    generator: Arc<dyn FixGenerator>,
    finalizer: Arc<dyn Finalizer>,
    test_command: Option<String>,
}

impl FixLoop {
    /// Create a new engine from its four collaborators
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        sandbox: Arc<dyn SandboxExecutor>,
        generator: Arc<dyn FixGenerator>,
        finalizer: Arc<dyn Finalizer>,
    ) -> Self {
        Self {
            analyzer,
            sandbox,
            generator,
            finalizer,
            test_command: None,
        }
    }

    /// Override the sandbox's per-language test command
    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = Some(command.into());
        self
    }

    /// Stream the deltas of one run.
    ///
    /// Ends after the finalization delta. An analyzer failure or an invalid
    /// transition is yielded as the last item. The analyzed checkout is
    /// released when the stream is dropped.
    pub fn stream(&self, state: RunState) -> impl Stream<Item = Result<StateDelta>> + Send + 'static {
        let engine = self.clone();
        let mut state = state;

        try_stream! {
            let (mut stage, mut actions) = transition(
                Stage::Idle,
                Event::Start {
                    repo_url: state.repo_url.clone(),
                },
            );

            let mut _checkout: Option<Checkout> = None;

            loop {
                let mut event = None;

                for action in actions {
                    let (delta, next_event) = match action {
                        Action::LogActivity { message } => {
                            info!("{}", message);
                            continue;
                        }
                        Action::Analyze => engine.analyze(&state).await?,
                        Action::ExecuteTests => engine.execute_tests(&state).await,
                        Action::GenerateFix => engine.generate_fix(&state).await,
                        Action::Finalize => engine.finalize(&state).await,
                    };
                    state.apply(&delta);
                    if let StateDelta::Analyzed { repo_path, .. } = &delta {
                        _checkout = Some(Checkout {
                            analyzer: engine.analyzer.clone(),
                            repo_path: repo_path.clone(),
                        });
                    }
                    yield delta;
                    event = Some(next_event);
                }

                if let Stage::Faulted { error } = &stage {
                    Err::<(), _>(MenderError::InvalidTransition(error.clone()))?;
                }
                if stage == Stage::Done {
                    break;
                }

                let event = event.ok_or_else(|| {
                    MenderError::InvalidTransition(format!("{:?} produced no event", stage))
                })?;
                let (next_stage, next_actions) = transition(stage, event);
                stage = next_stage;
                actions = next_actions;
            }
        }
    }

    /// Run to completion and return the final state
    pub async fn run(&self, state: RunState) -> Result<RunState> {
        let mut final_state = state.clone();
        let mut deltas = Box::pin(self.stream(state));

        while let Some(delta) = deltas.next().await {
            final_state.apply(&delta?);
        }

        Ok(final_state)
    }

    async fn analyze(&self, state: &RunState) -> Result<(StateDelta, Event)> {
        let analysis = self.analyzer.analyze(&state.repo_url).await?;

        let mut logs = state.logs.clone();
        logs.push(format!(
            "Analyzed repo: {}, found {} test files",
            analysis.language,
            analysis.test_files.len()
        ));

        let event = Event::Analyzed {
            language: analysis.language.to_string(),
            test_files: analysis.test_files.len(),
        };
        let delta = StateDelta::Analyzed {
            repo_path: analysis.repo_path,
            language: analysis.language,
            test_files: analysis.test_files,
            logs,
        };
        Ok((delta, event))
    }

    async fn execute_tests(&self, state: &RunState) -> (StateDelta, Event) {
        let outcome = self
            .sandbox
            .execute_tests(&state.repo_path, state.language, self.test_command.as_deref())
            .await;

        if let TestOutcome::Errored { message } = &outcome {
            warn!("Sandbox could not run tests: {}", message);
        }

        let current_retry = state.current_retry + 1;
        let status = if outcome.passed() {
            RunStatus::TestsPassed
        } else {
            RunStatus::TestsFailed
        };
        let exit_code = outcome
            .exit_code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_string());

        let mut logs = state.logs.clone();
        logs.push(format!("Tests finished with exit code {}", exit_code));
        logs.push(outcome.logs().to_string());

        let event = Event::TestsFinished {
            passed: outcome.passed(),
            attempt: current_retry,
            max_retries: state.max_retries,
        };
        let delta = StateDelta::Tested {
            status,
            current_retry,
            logs,
        };
        (delta, event)
    }

    async fn generate_fix(&self, state: &RunState) -> (StateDelta, Event) {
        let error_log = state.last_log().to_string();
        let bug_type = classify_error(&error_log);
        let line = extract_line_number(&error_log);

        let mut logs = state.logs.clone();
        let fix = match select_target(&state.test_files) {
            Some(target) => {
                self.apply_fix(target, &error_log, state.language, bug_type, line, &mut logs)
                    .await
            }
            None => {
                warn!("No test files to fix, recording fix against '{}'", UNKNOWN_TARGET);
                Fix::new(UNKNOWN_TARGET, bug_type, line)
            }
        };

        if fix.status == FixStatus::Applied {
            logs.push(format!(
                "Applied fix to {}: {} at line {}",
                fix.file, bug_type, line
            ));
        }

        let event = Event::FixApplied {
            file: fix.file.clone(),
        };
        let mut fixes = state.fixes.clone();
        fixes.push(fix);

        (StateDelta::Fixed { fixes, logs }, event)
    }

    /// Read, regenerate and overwrite one file.
    ///
    /// Generator failures keep the original content. A file that cannot be
    /// read is left untouched.
    async fn apply_fix(
        &self,
        target: &Path,
        error_log: &str,
        language: Language,
        bug_type: BugType,
        line: u32,
        logs: &mut Vec<String>,
    ) -> Fix {
        let file = target.display().to_string();

        let original = match tokio::fs::read_to_string(target).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read fix target {}: {}", file, e);
                logs.push(format!("Failed to apply fix to {}: {}", file, e));
                return Fix::new(file, bug_type, line).with_status(FixStatus::Failed);
            }
        };

        let fixed = match self
            .generator
            .generate_fix(&original, error_log, language)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Fix generation failed for {}, keeping original content: {}",
                    file, e
                );
                original
            }
        };

        match tokio::fs::write(target, fixed.as_bytes()).await {
            Ok(()) => {
                debug!("Wrote {} bytes to {}", fixed.len(), file);
                Fix::new(file, bug_type, line)
            }
            Err(e) => {
                warn!("Could not write fix to {}: {}", file, e);
                logs.push(format!("Failed to apply fix to {}: {}", file, e));
                Fix::new(file, bug_type, line).with_status(FixStatus::Failed)
            }
        }
    }

    async fn finalize(&self, state: &RunState) -> (StateDelta, Event) {
        let branch = create_branch_name(&state.team_name, &state.leader_name);
        let commit_message = format!(
            "{} Applied {} fixes",
            COMMIT_MESSAGE_PREFIX,
            state.fixes.len()
        );

        let (summary, success) = match self
            .finalizer
            .finalize(&state.repo_path, &branch, &commit_message)
            .await
        {
            Ok(outcome) => (
                format!("Git operation: {} - {}", outcome.status, outcome.branch),
                outcome.status == GitOpStatus::Success,
            ),
            Err(e) => {
                warn!("Finalization on {} failed: {}", branch, e);
                (format!("Git operation: failed - {}: {}", branch, e), false)
            }
        };

        let mut logs = state.logs.clone();
        logs.push(summary);

        let event = Event::Finalized {
            branch: branch.clone(),
            success,
        };
        (StateDelta::Finalized { branch, logs }, event)
    }
}
