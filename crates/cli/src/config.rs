//! Configuration resolution for the CLI
//!
//! Precedence: command-line flags, then `CONTROLLER__*` environment
//! variables, then the config file, then built-in defaults.

use crate::{Cli, LoopArgs};
use anyhow::{Context, Result};
use controller_lib::ControllerConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file location (`~/.config/dcctl/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    let home = dirs_next::home_dir()?;
    Some(home.join(".config").join("dcctl").join("config.toml"))
}

/// Explicit `--config`, else the default file when it exists
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    }
}

/// Load the controller configuration and apply global flags
pub fn load(cli: &Cli) -> Result<ControllerConfig> {
    let path = config_path(cli.config.as_deref());
    let mut config = ControllerConfig::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("Failed to load config from {}", p.display()),
        None => "Failed to load config from environment".to_string(),
    })?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(log) = &cli.alert_log {
        config.alert_log_path = log.clone();
    }

    debug!(
        config_file = ?path,
        data_dir = %config.data_dir.display(),
        alert_log = %config.alert_log_path.display(),
        tau = config.tau,
        "Resolved configuration"
    );
    Ok(config)
}

/// Apply per-command loop overrides
pub fn apply_loop_args(mut config: ControllerConfig, args: &LoopArgs) -> ControllerConfig {
    if let Some(tau) = args.tau {
        config.tau = tau;
    }
    if args.use_llm {
        config.llm.enabled = true;
    }
    config
}
