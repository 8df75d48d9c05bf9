//! External command execution abstraction

use async_trait::async_trait;
use mender_core::{MenderError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Output;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Output from an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, the way a terminal would show them
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        }
    }
}

/// Trait for running external programs (allows mocking in tests)
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`. Errors only if the process could not be
    /// spawned; a non-zero exit is a normal `CommandOutput`.
    async fn run(&self, program: &str, args: &[String], cwd: Option<&Path>)
        -> Result<CommandOutput>;
}

/// Real process runner
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    #[instrument(skip(self, args), fields(program = %program))]
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        debug!("Executing {} {:?}", program, args);

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| MenderError::Sandbox(format!("Failed to execute {}: {}", program, e)))?;

        let output = CommandOutput::from(output);
        if !output.success() {
            debug!("{} exited with {:?}: {}", program, output.exit_code, output.stderr);
        }

        Ok(output)
    }
}

/// Mock runner for testing.
///
/// Responses are matched on the longest registered prefix of the full
/// command line. Every command line is recorded.
#[derive(Default)]
pub struct MockRunner {
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.responses.insert(prefix.to_string(), output);
        self
    }

    /// Shorthand for a response with the given exit code and stdout
    pub fn with_exit(self, prefix: &str, exit_code: i32, stdout: &str) -> Self {
        self.with_response(
            prefix,
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(exit_code),
            },
        )
    }

    /// Recorded command lines, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        self.responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, output)| output.clone())
            .ok_or_else(|| MenderError::Sandbox(format!("No mock response for: {}", line)))
    }
}
