//! # mender-server
//!
//! Thin HTTP surface over the run driver: one endpoint starts a run, one
//! reads its report. Runs execute on background tasks, so triggering
//! returns immediately.

mod app;
mod error;
mod server;

pub use app::driver_from_config;
pub use error::ApiError;
pub use server::{build_router, serve, AppState, SharedState};
