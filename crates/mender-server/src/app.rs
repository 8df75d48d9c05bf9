//! Production wiring of the four collaborators

use mender_agent::LlmFixGenerator;
use mender_core::MenderConfig;
use mender_orchestrator::FixLoop;
use mender_runs::{ReportStore, RunDriver, RunRegistry};
use mender_sandbox::{DockerSandbox, GitCloneAnalyzer};
use mender_vcs::GitFinalizer;
use std::sync::Arc;
use std::time::Duration;

/// Build a driver backed by git, docker and the Anthropic API
pub fn driver_from_config(config: &MenderConfig) -> anyhow::Result<RunDriver> {
    let generator = LlmFixGenerator::from_config(&config.models)?;

    let mut fix_loop = FixLoop::new(
        Arc::new(GitCloneAnalyzer::from_config(&config.sandbox)),
        Arc::new(DockerSandbox::from_config(&config.sandbox)),
        Arc::new(generator),
        Arc::new(GitFinalizer::from_config(&config.git)),
    );
    if let Some(command) = &config.run.test_command {
        fix_loop = fix_loop.with_test_command(command.clone());
    }

    let mut driver = RunDriver::new(fix_loop, RunRegistry::new())
        .with_store(ReportStore::new(&config.server.results_dir));
    if let Some(secs) = config.run.timeout_secs {
        driver = driver.with_timeout(Duration::from_secs(secs));
    }

    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds() {
        assert!(driver_from_config(&MenderConfig::default()).is_ok());
    }

    #[test]
    fn test_test_command_and_timeout_accepted() {
        let mut config = MenderConfig::default();
        config.run.test_command = Some("pytest -x".to_string());
        config.run.timeout_secs = Some(600);
        assert!(driver_from_config(&config).is_ok());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let mut config = MenderConfig::default();
        config.models.model = "gpt-4".to_string();
        assert!(driver_from_config(&config).is_err());
    }
}
