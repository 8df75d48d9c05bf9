//! # mender-vcs
//!
//! Commits a run's fixes to its dedicated branch.

mod command;
mod finalizer;

pub use command::{GitCommand, GitExecutor, GitOutput, MockGitExecutor};
pub use finalizer::GitFinalizer;
