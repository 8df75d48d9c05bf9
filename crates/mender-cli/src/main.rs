//! Mender CLI - fix a repository's failing tests until they pass
//!
//! Usage:
//!   mender init [path]                       Write a default .mender/config.toml
//!   mender serve [--bind ADDR]               Run the trigger/status HTTP API
//!   mender run <url> --team T --leader L     Run one fix loop in the foreground

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mender_core::{MenderConfig, RunRequest};
use mender_runs::FinalStatus;
use mender_server::{driver_from_config, serve, AppState};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "mender")]
#[command(author, version, about = "Fix failing test suites until they pass")]
struct Cli {
    /// Enable verbose logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to .mender/config.toml in the current directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Serve the trigger and status API
    Serve {
        /// Address to bind, overriding the config file
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run one fix loop and print its report
    Run {
        /// Repository to clone
        url: String,

        #[arg(long)]
        team: String,

        #[arg(long)]
        leader: String,

        /// Retry budget, overriding the config file
        #[arg(long)]
        max_retries: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        Commands::Serve { bind } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_serve(config, bind).await
        }
        Commands::Run {
            url,
            team,
            leader,
            max_retries,
        } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_run(config, RunRequest::new(url, team, leader), max_retries).await
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<MenderConfig> {
    match explicit {
        Some(path) => MenderConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            MenderConfig::load_or_default(&cwd).context("Failed to load .mender/config.toml")
        }
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    info!("Initializing Mender in {:?}", path);

    let written = MenderConfig::write_default(path).context("Failed to write default config")?;

    println!("Initialized Mender in {:?}", path);
    println!("Created:");
    println!("  {}", written.display());
    Ok(())
}

async fn cmd_serve(config: MenderConfig, bind: Option<String>) -> Result<()> {
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let driver = driver_from_config(&config)?;

    let state = AppState {
        driver,
        max_retries: config.run.max_retries,
    };
    serve(state, &addr)
        .await
        .with_context(|| format!("Server on {} stopped", addr))
}

async fn cmd_run(
    config: MenderConfig,
    request: RunRequest,
    max_retries: Option<u32>,
) -> Result<()> {
    let driver = driver_from_config(&config)?;
    let max_retries = max_retries.unwrap_or(config.run.max_retries);

    let (run_id, report) = driver.run(request, max_retries).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("Report for run {} saved under {:?}", run_id, config.server.results_dir);

    if report.final_status() != FinalStatus::Passed {
        bail!("Run {} finished with {}", run_id, report.final_status());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "mender",
            "run",
            "https://github.com/acme/app",
            "--team",
            "team alpha",
            "--leader",
            "jane doe",
            "--max-retries",
            "2",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                url,
                team,
                max_retries,
                ..
            } => {
                assert_eq!(url, "https://github.com/acme/app");
                assert_eq!(team, "team alpha");
                assert_eq!(max_retries, Some(2));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_team_and_leader() {
        assert!(Cli::try_parse_from(["mender", "run", "https://github.com/a/b"]).is_err());
    }
}
