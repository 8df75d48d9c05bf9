//! Configuration management for Mender
//!
//! Settings for the run loop, the HTTP server, the test sandbox, the fix
//! model and the git finalizer. Loaded from `.mender/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{MenderError, Result, DEFAULT_MAX_RETRIES};

/// Relative location of the config file inside a working directory
pub const CONFIG_PATH: &str = ".mender/config.toml";

/// Top-level Mender configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenderConfig {
    /// Run loop defaults
    #[serde(default)]
    pub run: RunDefaults,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Container sandbox settings
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Fix generation model
    #[serde(default)]
    pub models: ModelConfig,

    /// Git finalization
    #[serde(default)]
    pub git: GitConfig,
}

/// Default run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    /// Fix cycles permitted before forced finalization
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Abort a run that takes longer than this
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Test command for every run, replacing the per-language default
    #[serde(default)]
    pub test_command: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the trigger API listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory finished run reports are written to
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

/// Test sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Container runtime CLI
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    #[serde(default = "default_python_image")]
    pub python_image: String,

    #[serde(default = "default_node_image")]
    pub node_image: String,

    #[serde(default = "default_python_command")]
    pub python_command: String,

    #[serde(default = "default_node_command")]
    pub node_command: String,

    /// Where repositories are cloned. Defaults to the system temp dir.
    #[serde(default)]
    pub clone_root: Option<PathBuf>,

    /// Leave each run's clone on disk instead of deleting it when the run ends
    #[serde(default)]
    pub keep_clones: bool,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model alias (opus, sonnet, haiku)
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

/// Git finalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Push the fix branch after committing
    #[serde(default)]
    pub push: bool,

    #[serde(default = "default_remote")]
    pub remote: String,
}

// Default value providers
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_python_image() -> String {
    "python:3.9-slim".to_string()
}

fn default_node_image() -> String {
    "node:18-slim".to_string()
}

fn default_python_command() -> String {
    "pytest".to_string()
}

fn default_node_command() -> String {
    "npm test".to_string()
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> usize {
    16000
}

fn default_remote() -> String {
    "origin".to_string()
}

impl MenderConfig {
    /// Load configuration from `.mender/config.toml` under `root`, or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_PATH);

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| MenderError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Write default configuration to `.mender/config.toml` under `root`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_path = root.join(CONFIG_PATH);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| MenderError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: None,
            test_command: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            results_dir: default_results_dir(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            python_image: default_python_image(),
            node_image: default_node_image(),
            python_command: default_python_command(),
            node_command: default_node_command(),
            clone_root: None,
            keep_clones: false,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            push: false,
            remote: default_remote(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = MenderConfig::default();
        assert_eq!(config.run.max_retries, 5);
        assert_eq!(config.sandbox.python_image, "python:3.9-slim");
        assert_eq!(config.sandbox.node_command, "npm test");
        assert!(!config.git.push);
        assert!(!config.sandbox.keep_clones);
        assert_eq!(config.run.test_command, None);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = MenderConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".mender")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_PATH),
            "[run]\nmax_retries = 2\ntimeout_secs = 600\ntest_command = \"pytest -x\"\n\n[git]\npush = true\n",
        )
        .unwrap();

        let config = MenderConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.run.max_retries, 2);
        assert_eq!(config.run.timeout_secs, Some(600));
        assert_eq!(config.run.test_command.as_deref(), Some("pytest -x"));
        assert!(config.git.push);
        assert_eq!(config.git.remote, "origin");
        assert_eq!(config.models.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_write_default_round_trip() {
        let dir = tempdir().unwrap();
        let path = MenderConfig::write_default(dir.path()).unwrap();
        assert!(path.exists());

        let config = MenderConfig::load(&path).unwrap();
        assert_eq!(config.run.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "run = [").unwrap();
        assert!(matches!(
            MenderConfig::load(&path),
            Err(MenderError::Config(_))
        ));
    }
}
