//! Containerized test execution

use crate::command::{CommandRunner, ProcessRunner};
use async_trait::async_trait;
use mender_core::config::SandboxConfig;
use mender_core::fail_open::fail_open;
use mender_core::{Language, MenderError, SandboxExecutor, TestOutcome};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Mount point of the repository inside the container
const WORKDIR: &str = "/app";

/// `docker run` exits 125 when the daemon could not start the container
const DOCKER_RUN_FAILED: i32 = 125;

/// Runs a repository's test suite in a fresh container with the checkout
/// bind-mounted read-write, then removes the container.
#[derive(Clone)]
pub struct DockerSandbox {
    runner: Arc<dyn CommandRunner>,
    config: SandboxConfig,
}

impl DockerSandbox {
    pub fn new(runner: Arc<dyn CommandRunner>, config: SandboxConfig) -> Self {
        Self { runner, config }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(Arc::new(ProcessRunner), config.clone())
    }

    /// Image and default test command for a language
    fn image_for(&self, language: Language) -> Option<(&str, &str)> {
        match language {
            Language::Python => Some((
                self.config.python_image.as_str(),
                self.config.python_command.as_str(),
            )),
            Language::JavaScript => Some((
                self.config.node_image.as_str(),
                self.config.node_command.as_str(),
            )),
            Language::Unknown => None,
        }
    }
}

fn removal_args(name: &str) -> Vec<String> {
    vec!["rm".to_string(), "-f".to_string(), name.to_string()]
}

async fn remove_container(runner: &dyn CommandRunner, docker: &str, name: &str) {
    let args = removal_args(name);
    let removed = fail_open("container_cleanup", || runner.run(docker, &args, None)).await;
    if let Some(output) = removed {
        if !output.success() {
            warn!("Could not remove container {}: {}", name, output.stderr.trim());
        }
    }
}

/// Owns a started container. `docker run` is attached, so dropping the
/// caller mid-run kills only the CLI client; the guard then force-removes
/// the container from a spawned task.
struct Container {
    runner: Arc<dyn CommandRunner>,
    docker: String,
    name: String,
    removed: bool,
}

impl Container {
    async fn remove(mut self) {
        self.removed = true;
        remove_container(self.runner.as_ref(), &self.docker, &self.name).await;
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to remove abandoned container {}", self.name);
            return;
        };
        warn!("Test run abandoned, removing container {}", self.name);
        let runner = self.runner.clone();
        let docker = self.docker.clone();
        let name = self.name.clone();
        runtime.spawn(async move {
            remove_container(runner.as_ref(), &docker, &name).await;
        });
    }
}

#[async_trait]
impl SandboxExecutor for DockerSandbox {
    async fn execute_tests(
        &self,
        repo_path: &Path,
        language: Language,
        test_command: Option<&str>,
    ) -> TestOutcome {
        let Some((image, default_command)) = self.image_for(language) else {
            return TestOutcome::Errored {
                message: MenderError::UnsupportedLanguage(language.to_string()).to_string(),
            };
        };
        let command = test_command.unwrap_or(default_command);

        let host_path = match tokio::fs::canonicalize(repo_path).await {
            Ok(path) => path,
            Err(e) => {
                return TestOutcome::Errored {
                    message: format!("Cannot mount {}: {}", repo_path.display(), e),
                }
            }
        };

        let name = format!("mender-{}", Uuid::new_v4());
        let args = vec![
            "run".to_string(),
            "--name".to_string(),
            name.clone(),
            "-v".to_string(),
            format!("{}:{}", host_path.display(), WORKDIR),
            "-w".to_string(),
            WORKDIR.to_string(),
            image.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            format!("cd {} && {}", WORKDIR, command),
        ];

        info!("Running '{}' in {} for {:?}", command, image, repo_path);
        let container = Container {
            runner: self.runner.clone(),
            docker: self.config.docker_binary.clone(),
            name: name.clone(),
            removed: false,
        };
        let result = self.runner.run(&self.config.docker_binary, &args, None).await;

        let outcome = match result {
            Err(e) => TestOutcome::Errored {
                message: e.to_string(),
            },
            Ok(output) => match output.exit_code {
                Some(DOCKER_RUN_FAILED) => TestOutcome::Errored {
                    message: MenderError::Sandbox(output.stderr.trim().to_string()).to_string(),
                },
                Some(code) => TestOutcome::Completed {
                    exit_code: i64::from(code),
                    logs: output.combined(),
                },
                None => TestOutcome::Errored {
                    message: "Test container was killed".to_string(),
                },
            },
        };

        debug!("Container {} finished: {:?}", name, outcome.exit_code());
        container.remove().await;
        outcome
    }
}
