//! Configuration management for the Jam3a rate limiting service.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `JAM3A__`-prefixed environment variables (`JAM3A__RATE_LIMITING__MAX=50`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{Jam3aError, Result};
use crate::ratelimit::{LimiterConfig, RuleSet};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "JAM3A";

/// Main configuration for the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Default window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Default maximum requests per window per client
    #[serde(default = "default_max")]
    pub max: u64,

    /// Minimum interval between sweeps of expired records; defaults to `window_ms`
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer address
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Path to a YAML rule file, merged after inline rules
    #[serde(default)]
    pub rules_path: Option<String>,

    /// Inline route rules
    #[serde(default)]
    pub rules: RuleSet,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max: default_max(),
            sweep_interval_ms: None,
            trust_forwarded_for: false,
            rules_path: None,
            rules: RuleSet::default(),
        }
    }
}

fn default_window_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max() -> u64 {
    100
}

impl RateLimitingConfig {
    /// Limiter parameters for paths no rule matches.
    pub fn limiter_config(&self) -> LimiterConfig {
        let config = LimiterConfig::new(self.window_ms, self.max);
        match self.sweep_interval_ms {
            Some(interval) => config.with_sweep_interval(interval),
            None => config,
        }
    }

    /// Inline rules followed by those from `rules_path`, if set.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = self.rules.clone();
        if let Some(path) = &self.rules_path {
            let loaded = RuleSet::from_file(path)?;
            rules.rules.extend(loaded.rules);
            rules.exempt_paths.extend(loaded.exempt_paths);
        }
        rules.validate()?;
        Ok(rules)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.rate_limiting.limiter_config().validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Jam3aError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.rate_limiting.limiter_config().validate()?;
        Ok(config)
    }
}
