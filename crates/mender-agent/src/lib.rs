//! # mender-agent
//!
//! LLM-backed fix generation for Mender.
//!
//! Each fix is a single stateless request: the failing file and the test
//! log go in, corrected file content comes out. Nothing is remembered
//! between fixes, so every attempt sees the file as it is on disk now.
//!
//! Failures never reach the fix loop. Missing credentials, an open circuit
//! breaker, rate limits that outlast the retries, or an unusable response
//! all degrade to returning the original content unchanged.

mod auth;
mod circuit_breaker;
mod client;
mod prompt;
mod types;

pub use auth::api_key;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::LlmFixGenerator;
pub use prompt::{build_fix_prompt, extract_code};
pub use types::*;
