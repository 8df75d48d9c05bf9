//! Pure state machine for run control flow
//!
//! This module implements a pure functional state machine with NO I/O.
//! All state transitions are deterministic and testable.
//!
//! Key design principles:
//! - Pure function: transition(stage, event) -> (stage, actions)
//! - No async, no I/O
//! - Invalid transitions go to Faulted (never panic)
//! - The only branch is after testing: fix again or finalize

/// Stage of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Not started
    Idle,
    /// Cloning and classifying the repository
    Analyzing,
    /// Running the test suite in the sandbox
    Testing,
    /// Generating and applying a fix for the last failure
    Fixing,
    /// Committing accumulated fixes
    Finalizing,
    /// Terminal
    Done,
    /// Terminal: the machine received an event it cannot handle
    Faulted { error: String },
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Faulted { .. })
    }
}

/// Events reported by the engine after each collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Start a new run
    Start { repo_url: String },
    /// Repository cloned and classified
    Analyzed { language: String, test_files: usize },
    /// Test suite finished. `attempt` is the retry counter after increment.
    TestsFinished {
        passed: bool,
        attempt: u32,
        max_retries: u32,
    },
    /// A fix was generated and written
    FixApplied { file: String },
    /// Fixes were committed (or the commit failed)
    Finalized { branch: String, success: bool },
}

/// Actions to execute as side effects of transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Clone and classify the repository
    Analyze,
    /// Run the test suite
    ExecuteTests,
    /// Generate and apply a fix
    GenerateFix,
    /// Commit accumulated fixes
    Finalize,
    /// Log activity
    LogActivity { message: String },
}

/// Pure state transition function
///
/// Takes the current stage and event, returns the next stage and the
/// actions to execute. Exactly one collaborator action is returned for
/// every non-terminal stage.
///
/// # Invalid Transitions
/// Any invalid transition results in a Faulted stage with descriptive error.
/// This function never panics.
pub fn transition(stage: Stage, event: Event) -> (Stage, Vec<Action>) {
    match (stage, event) {
        (Stage::Idle, Event::Start { repo_url }) => (
            Stage::Analyzing,
            vec![
                Action::LogActivity {
                    message: format!("Starting run for {}", repo_url),
                },
                Action::Analyze,
            ],
        ),

        (
            Stage::Analyzing,
            Event::Analyzed {
                language,
                test_files,
            },
        ) => (
            Stage::Testing,
            vec![
                Action::LogActivity {
                    message: format!(
                        "Analysis complete: {} with {} test files",
                        language, test_files
                    ),
                },
                Action::ExecuteTests,
            ],
        ),

        (
            Stage::Testing,
            Event::TestsFinished {
                passed,
                attempt,
                max_retries,
            },
        ) => {
            if passed {
                (
                    Stage::Finalizing,
                    vec![
                        Action::LogActivity {
                            message: format!("Tests passed on attempt {}", attempt),
                        },
                        Action::Finalize,
                    ],
                )
            } else if attempt > max_retries {
                (
                    Stage::Finalizing,
                    vec![
                        Action::LogActivity {
                            message: format!(
                                "Retry budget exhausted ({}/{}), finalizing",
                                attempt, max_retries
                            ),
                        },
                        Action::Finalize,
                    ],
                )
            } else {
                (
                    Stage::Fixing,
                    vec![
                        Action::LogActivity {
                            message: format!(
                                "Tests failed on attempt {}/{}, generating fix",
                                attempt, max_retries
                            ),
                        },
                        Action::GenerateFix,
                    ],
                )
            }
        }

        (Stage::Fixing, Event::FixApplied { file }) => (
            Stage::Testing,
            vec![
                Action::LogActivity {
                    message: format!("Fix written to {}, re-testing", file),
                },
                Action::ExecuteTests,
            ],
        ),

        (Stage::Finalizing, Event::Finalized { branch, success }) => (
            Stage::Done,
            vec![Action::LogActivity {
                message: if success {
                    format!("Run finalized on branch {}", branch)
                } else {
                    format!("Run finalized, git operations on {} failed", branch)
                },
            }],
        ),

        // Terminal stages - no valid transitions
        (Stage::Done, event) => (
            Stage::Faulted {
                error: format!("Invalid transition from Done on event: {:?}", event),
            },
            vec![],
        ),

        (Stage::Faulted { error }, event) => (
            Stage::Faulted {
                error: format!(
                    "Invalid transition from Faulted state (error: {}) on event: {:?}",
                    error, event
                ),
            },
            vec![],
        ),

        // All other invalid transitions
        (stage, event) => (
            Stage::Faulted {
                error: format!(
                    "Invalid stage transition: {:?} cannot handle event {:?}",
                    stage, event
                ),
            },
            vec![],
        ),
    }
}
