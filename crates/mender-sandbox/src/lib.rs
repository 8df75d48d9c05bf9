//! # mender-sandbox
//!
//! The two collaborators that touch the outside world before a fix:
//! cloning and classifying a repository (`GitCloneAnalyzer`) and running
//! its tests inside a throwaway container (`DockerSandbox`).
//!
//! Both shell out through `CommandRunner`, so tests drive them with
//! `MockRunner` instead of real git and docker binaries.

mod analyzer;
mod command;
mod docker;

pub use analyzer::{classify_tree, GitCloneAnalyzer};
pub use command::{CommandOutput, CommandRunner, MockRunner, ProcessRunner};
pub use docker::DockerSandbox;
