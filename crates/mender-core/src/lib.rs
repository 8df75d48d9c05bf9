//! # mender-core
//!
//! Core types for the Mender fix-until-green orchestration system.
//!
//! A run clones a repository, executes its tests in a sandbox, asks an LLM to
//! patch the failing file, and loops until the suite is green or the retry
//! budget is spent. Everything after that is committed to a deterministic
//! branch.
//!
//! This crate provides:
//! - Run state, fix records and the typed deltas emitted by every stage
//! - Async traits for the four external collaborators (plus mocks)
//! - Repository-level configuration
//! - Fail-open helpers for best-effort side effects

pub mod config;
mod error;
pub mod fail_open;
mod stages;
mod types;

pub use config::MenderConfig;
pub use error::{MenderError, Result};
pub use stages::{
    Analysis, Analyzer, FinalizeOutcome, Finalizer, FixGenerator, GitOpStatus, MockAnalyzer,
    MockFinalizer, MockFixGenerator, MockSandbox, SandboxExecutor, TestOutcome,
};
pub use types::*;
