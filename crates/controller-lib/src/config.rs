//! Controller configuration
//!
//! Layered with the `config` crate: an optional file (format chosen by
//! extension) under environment variables prefixed `CONTROLLER`, using `__`
//! as the nesting separator (`CONTROLLER__LLM__ENABLED=true`).

use crate::fixture::DEFAULT_CACHE_CAPACITY;
use crate::models::DEFAULT_TAU;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable the LLM API key is read from when not configured
pub const API_KEY_ENV: &str = "NEMOTRON_KEY";

/// Chat-completions endpoint used by the remote hooks
pub const DEFAULT_LLM_ENDPOINT: &str = "https://integrate.api.nvidia.com/v1/chat/completions";

/// Model requested from the endpoint
pub const DEFAULT_LLM_MODEL: &str = "nvidia/nvidia-nemotron-nano-9b-v2";

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Directory holding `clusters.json` and `scenario_DC_<id>.json`
    pub data_dir: PathBuf,

    /// JSON-lines file the verifier appends alerts to
    pub alert_log_path: PathBuf,

    /// Stability threshold on per-cluster power balance (kW)
    pub tau: f64,

    /// Number of parsed fixtures kept in memory
    pub fixture_cache_capacity: usize,

    /// Remote hook settings
    pub llm: LlmConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            alert_log_path: PathBuf::from("alerts.log"),
            tau: DEFAULT_TAU,
            fixture_cache_capacity: DEFAULT_CACHE_CAPACITY,
            llm: LlmConfig::default(),
        }
    }
}

/// Settings for the optional LLM-backed hooks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Try the remote planner before the greedy one
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Bearer token; defaults to `$NEMOTRON_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: api_key_from_env(),
            timeout_secs: 30,
        }
    }
}

fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

impl ControllerConfig {
    /// Load from an optional file plus `CONTROLLER__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CONTROLLER")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: ControllerConfig = builder
            .build()
            .context("Failed to read controller configuration")?
            .try_deserialize()
            .context("Invalid controller configuration")?;

        if loaded.llm.api_key.is_none() {
            loaded.llm.api_key = api_key_from_env();
        }

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the control loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.tau.is_finite() {
            bail!("tau must be a finite number, got {}", self.tau);
        }
        if self.fixture_cache_capacity == 0 {
            bail!("fixture_cache_capacity must be at least 1");
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.alert_log_path, PathBuf::from("alerts.log"));
        assert_eq!(config.tau, -2.0);
        assert_eq!(config.fixture_cache_capacity, 8);
        assert!(!config.llm.enabled);
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.toml");
        std::fs::write(
            &path,
            r#"
tau = -1.5
data_dir = "fixtures"

[llm]
enabled = true
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = ControllerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tau, -1.5);
        assert_eq!(config.data_dir, PathBuf::from("fixtures"));
        assert!(config.llm.enabled);
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.endpoint, DEFAULT_LLM_ENDPOINT);
        assert_eq!(config.fixture_cache_capacity, 8);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ControllerConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ControllerConfig {
            tau: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.tau = -2.0;
        config.fixture_cache_capacity = 0;
        assert!(config.validate().is_err());
    }
}
