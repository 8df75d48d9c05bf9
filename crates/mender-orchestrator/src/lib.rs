//! # mender-orchestrator
//!
//! Fix-verify orchestration engine for Mender.
//!
//! This crate provides:
//! - A pure state machine sequencing Analyze, Test, Fix and Finalize
//! - Log classification used to describe each fix
//! - The `FixLoop` engine that drives one run and streams its deltas

mod engine;
mod fixer;
mod state_machine;

pub use engine::{FixLoop, COMMIT_MESSAGE_PREFIX};
pub use fixer::{classify_error, extract_line_number, select_target};
pub use state_machine::{transition, Action, Event, Stage};
