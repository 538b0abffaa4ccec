//! ---
//! kansas_section: "01-core-functionality"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Shared primitives and utilities for the load tooling."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_host() -> String {
    "http://127.0.0.1:9799".to_owned()
}

fn default_verify_tls() -> bool {
    false
}

fn default_users() -> usize {
    10
}

fn default_hatch_rate() -> String {
    "1".to_owned()
}

fn default_run_time() -> Duration {
    Duration::from_secs(60)
}

fn default_halted_idle() -> Duration {
    Duration::from_secs(5)
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_metrics_enabled() -> bool {
    false
}

fn default_metrics_listen() -> SocketAddr {
    "127.0.0.1:9898"
        .parse()
        .expect("valid default metrics address")
}

/// Primary configuration object for a load generation run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "KANSAS_CONFIG";

    /// Load configuration from disk, respecting the `KANSAS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Some(loaded) = Self::find(candidates)? {
            return Ok(loaded);
        }
        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Like [`AppConfig::load_with_source`] but falls back to defaults when no
    /// candidate exists. A candidate that exists but fails to parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        match Self::find(candidates)? {
            Some(loaded) => Ok(loaded),
            None => {
                debug!("no configuration file found; using built-in defaults");
                let config = AppConfig::default();
                config.validate()?;
                Ok(LoadedAppConfig {
                    config,
                    source: None,
                })
            }
        }
    }

    fn find<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<LoadedAppConfig>> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path),
                }));
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                }));
            }
        }
        Ok(None)
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        self.load.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Server under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Certificate verification for HTTPS targets.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            verify_tls: default_verify_tls(),
        }
    }
}

impl TargetConfig {
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.host)
            .with_context(|| format!("target host '{}' is not a valid url", self.host))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "target host '{}' must use http or https",
                self.host
            ));
        }
        if url.host_str().is_none() {
            return Err(anyhow!("target host '{}' has no host component", self.host));
        }
        Ok(())
    }
}

/// Load shape handed to the harness.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_users")]
    pub users: usize,
    /// Users launched per second; fractional rates such as `"0.5"` are allowed.
    #[serde(default = "default_hatch_rate")]
    pub hatch_rate: String,
    #[serde(default = "default_run_time")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub run_time: Duration,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub wait_time_min: Option<Duration>,
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub wait_time_max: Option<Duration>,
    /// Pause applied each time the harness invokes the task of a halted user.
    #[serde(default = "default_halted_idle")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub halted_idle: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            hatch_rate: default_hatch_rate(),
            run_time: default_run_time(),
            wait_time_min: None,
            wait_time_max: None,
            halted_idle: default_halted_idle(),
        }
    }
}

impl LoadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.users == 0 {
            return Err(anyhow!("load.users must be at least 1"));
        }
        let rate: f64 = self
            .hatch_rate
            .parse()
            .with_context(|| format!("load.hatch_rate '{}' is not a number", self.hatch_rate))?;
        if !(rate > 0.0) {
            return Err(anyhow!("load.hatch_rate must be positive"));
        }
        self.wait_time()?;
        Ok(())
    }

    /// Resolve the optional wait window between two task invocations.
    pub fn wait_time(&self) -> Result<Option<(Duration, Duration)>> {
        match (self.wait_time_min, self.wait_time_max) {
            (None, None) => Ok(None),
            (Some(min), Some(max)) if min <= max => Ok(Some((min, max))),
            (Some(_), Some(_)) => Err(anyhow!(
                "load.wait_time_min must not exceed load.wait_time_max"
            )),
            _ => Err(anyhow!(
                "load.wait_time_min and load.wait_time_max must be set together"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for per-run JSON log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}
