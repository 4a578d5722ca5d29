//! Configuration management for the throttle service.
//!
//! Configuration is read from an optional YAML file and then overlaid with
//! environment variables prefixed `NEURONOVA__` (nested keys separated by
//! `__`, e.g. `NEURONOVA__THROTTLE__MAX_REQUESTS_PER_WINDOW=50`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ThrottleError};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "NEURONOVA";
/// Separator between nested keys in environment variable names.
pub const ENV_SEPARATOR: &str = "__";

/// Main configuration for the throttle service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottleServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Throttle configuration
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Throttle configuration: the window length and the per-window quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Length of a counting window in milliseconds
    #[serde(default = "default_window_duration_ms")]
    pub window_duration_ms: u64,

    /// Requests admitted per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: u64,

    /// Seconds between background sweeps of expired records; 0 disables sweeping
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Take the client key from `X-Forwarded-For` when present
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: default_window_duration_ms(),
            max_requests_per_window: default_max_requests(),
            sweep_interval_secs: default_sweep_interval(),
            trust_forwarded_for: false,
        }
    }
}

fn default_window_duration_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max_requests() -> u64 {
    100
}

fn default_sweep_interval() -> u64 {
    60
}

impl ThrottleConfig {
    /// Create a throttle configuration with the given window and quota.
    pub fn new(window_duration_ms: u64, max_requests_per_window: u64) -> Self {
        Self {
            window_duration_ms,
            max_requests_per_window,
            ..Self::default()
        }
    }

    /// The window length as a `Duration`.
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_duration_ms)
    }

    /// The sweep interval, or `None` when background sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Reject configurations the throttle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_duration_ms == 0 {
            return Err(ThrottleError::Config(
                "window_duration_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_requests_per_window == 0 {
            return Err(ThrottleError::Config(
                "max_requests_per_window must be greater than zero".to_string(),
            ));
        }
        // chrono durations are bounded by i64 milliseconds
        if i64::try_from(self.window_duration_ms).is_err() {
            return Err(ThrottleError::Config(format!(
                "window_duration_ms is too large: {}",
                self.window_duration_ms
            )));
        }
        Ok(())
    }
}

impl ThrottleServiceConfig {
    /// Load configuration from an optional YAML file layered with
    /// `NEURONOVA__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), but reads overrides from `env` instead of
    /// the process environment when it is given.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            let name = path.to_str().ok_or_else(|| {
                ThrottleError::Config(format!("non UTF-8 config path: {}", path.display()))
            })?;
            builder = builder.add_source(::config::File::new(name, ::config::FileFormat::Yaml));
        }

        let environment = ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env);

        let config: ThrottleServiceConfig = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ThrottleServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ThrottleError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.throttle.validate()
    }
}
