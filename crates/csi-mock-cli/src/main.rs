#![deny(unsafe_code)]

//! mock-driver: serves a mock CSI plugin on the endpoints named by
//! `CSI_ENDPOINT` and `CSI_CONTROLLER_ENDPOINT`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use csi_mock_config::{AppConfig, ConfigError, EndpointSettings};
use csi_mock_core::{Coordinator, MockService, build_info};

/// Mock CSI driver for exercising container orchestrator storage plumbing.
#[derive(Parser, Debug)]
#[command(name = "mock-driver", version, about, long_about = None)]
struct Cli {
    /// Optional TOML file with `[driver]` and `[logging]` sections.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable attach/detach (controller publish and unpublish).
    #[arg(long)]
    disable_attach: bool,

    /// CSI driver name.
    #[arg(long)]
    name: Option<String>,

    /// Number of attachable volumes on a node.
    #[arg(long)]
    attach_limit: Option<i64>,

    /// Enables NodeServiceCapability_RPC_EXPAND_VOLUME capacity.
    #[arg(long = "node-expand-required")]
    node_expansion_required: bool,

    /// Enables PluginCapability_Service_VOLUME_ACCESSIBILITY_CONSTRAINTS capability.
    #[arg(long)]
    enable_topology: bool,

    /// Disables ControllerServiceCapability_RPC_EXPAND_VOLUME capability.
    #[arg(long)]
    disable_controller_expansion: bool,

    /// Disables online volume expansion capability.
    #[arg(long)]
    disable_online_expansion: bool,

    /// Allows the CO to create the target path and publish to an existing one.
    #[arg(long)]
    permissive_target_path: bool,

    /// YAML file with hook scripts.
    #[arg(long)]
    hooks_file: Option<PathBuf>,
}

impl Cli {
    /// Flags that were given win over the file.
    fn apply_overrides(&self, config: &mut AppConfig) {
        let driver = &mut config.driver;
        if let Some(name) = &self.name {
            driver.name.clone_from(name);
        }
        if let Some(limit) = self.attach_limit {
            driver.attach_limit = limit;
        }
        if let Some(path) = &self.hooks_file {
            driver.hooks_file = Some(path.clone());
        }
        driver.disable_attach |= self.disable_attach;
        driver.node_expansion_required |= self.node_expansion_required;
        driver.enable_topology |= self.enable_topology;
        driver.disable_controller_expansion |= self.disable_controller_expansion;
        driver.disable_online_expansion |= self.disable_online_expansion;
        driver.permissive_target_path |= self.permissive_target_path;
    }

    fn log_filter(&self, configured: Option<&str>) -> String {
        match self.verbose {
            0 => configured.unwrap_or("info").to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load_config(cli.config.as_deref()).await;
    let configured = loaded.as_ref().ok().map(|c| c.logging.level.as_str());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_filter(configured))),
        )
        .init();

    match run(&cli, loaded).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "mock-driver failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, loaded: Result<AppConfig, ConfigError>) -> Result<()> {
    let mut config = loaded.context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid driver settings")?;
    config.driver.resolve_hooks().await;

    let settings = EndpointSettings::from_env();
    info!(version = %build_info::version_string(), driver = %config.driver.name, "Starting mock driver");
    debug!(settings = ?settings, "Endpoint settings");

    let mut coordinator = Coordinator::new(&settings, MockService::shared(config.driver));
    let cause = coordinator.run().await?;
    info!(cause = ?cause, "Exiting");
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load(path).await,
        None => Ok(AppConfig::default()),
    }
}
