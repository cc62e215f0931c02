//! Configuration management for the CLI

use anyhow::{bail, Context, Result};
use evaluator_lib::{GatherConfig, DEFAULT_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Evaluator settings, read from a config file and `HPACTL_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Dead-band around a usage ratio of 1.0
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default = "default_cpu_initialization_period")]
    pub cpu_initialization_period_secs: u64,

    #[serde(default = "default_initial_readiness_delay")]
    pub initial_readiness_delay_secs: u64,

    /// Namespace used when a command does not name one
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_cpu_initialization_period() -> u64 {
    300
}

fn default_initial_readiness_delay() -> u64 {
    30
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            cpu_initialization_period_secs: default_cpu_initialization_period(),
            initial_readiness_delay_secs: default_initial_readiness_delay(),
            namespace: default_namespace(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; otherwise the file under the user's
    /// config directory is read if present. Environment variables override
    /// file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Ok(default_path) = Self::config_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config: Config = builder
            .add_source(config::Environment::with_prefix("HPACTL"))
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            bail!("tolerance must be a finite, non-negative number, got {}", self.tolerance);
        }
        Ok(())
    }

    pub fn gather_config(&self) -> GatherConfig {
        GatherConfig {
            cpu_initialization_period: Duration::from_secs(self.cpu_initialization_period_secs),
            delay_of_initial_readiness_status: Duration::from_secs(
                self.initial_readiness_delay_secs,
            ),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("hpactl").join("config.json"))
    }
}
