//! Configuration loading and typed config structures for the Tycoon engine.
//!
//! The configuration lives in a single YAML file (`tycoon.yaml` by default).
//! Every field is defaulted, so an empty file is a valid configuration that
//! runs the built-in `agriculture` plan against a local bridge with a file
//! progress store.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::gang::GangSettings;
use crate::plan::{Plan, PlanError};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// `engine.plan_name` names no built-in plan.
    #[error("unknown built-in plan: {name}")]
    UnknownPlan {
        /// The name that was asked for.
        name: String,
    },

    /// The configured plan cannot be run.
    #[error("invalid plan: {source}")]
    Plan {
        /// The underlying plan error.
        #[from]
        source: PlanError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TycoonConfig {
    /// Tick loop settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where progress is persisted.
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP bridge to the controlled entity.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Status API.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Inline plan; the built-in `engine.plan_name` plan is used when absent.
    #[serde(default)]
    pub plan: Option<Plan>,

    /// Gang controller tuning.
    #[serde(default)]
    pub gang: GangSettings,
}

impl TycoonConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TYCOON_BRIDGE_URL` overrides `bridge.base_url`
    /// - `TYCOON_DRAGONFLY_URL` overrides `store.dragonfly_url`
    /// - `TYCOON_TICK_INTERVAL_MS` overrides `engine.tick_interval_ms`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TYCOON_BRIDGE_URL") {
            self.bridge.base_url = val;
        }
        if let Ok(val) = std::env::var("TYCOON_DRAGONFLY_URL") {
            self.store.dragonfly_url = val;
        }
        if let Ok(val) = std::env::var("TYCOON_TICK_INTERVAL_MS") {
            match val.parse() {
                Ok(ms) => self.engine.tick_interval_ms = ms,
                Err(e) => warn!(value = %val, error = %e, "ignoring TYCOON_TICK_INTERVAL_MS"),
            }
        }
    }

    /// The plan to run: the inline plan if given, else the named built-in.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPlan`] if no built-in has that name, or
    /// [`ConfigError::Plan`] if the plan fails validation.
    pub fn resolve_plan(&self) -> Result<Plan, ConfigError> {
        let plan = match &self.plan {
            Some(plan) => plan.clone(),
            None => Plan::builtin(&self.engine.plan_name).ok_or_else(|| {
                ConfigError::UnknownPlan {
                    name: self.engine.plan_name.clone(),
                }
            })?,
        };
        plan.validate()?;
        Ok(plan)
    }
}

/// Which controller the engine runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    /// Phased corporation build-out.
    #[default]
    Corporation,
    /// Gang steady-state controller.
    Gang,
}

/// Tick loop settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Which controller to run.
    #[serde(default)]
    pub mode: EngineMode,

    /// Stop after this many ticks; 0 runs forever.
    #[serde(default)]
    pub max_ticks: u64,

    /// Funds must cover `cost × safety_margin` before an action is tried.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    /// Built-in plan used when no inline plan is given.
    #[serde(default = "default_plan_name")]
    pub plan_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            mode: EngineMode::default(),
            max_ticks: 0,
            safety_margin: default_safety_margin(),
            plan_name: default_plan_name(),
        }
    }
}

/// Progress store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON file on local disk.
    #[default]
    File,
    /// Dragonfly (Redis-compatible) key.
    Dragonfly,
}

/// Where progress is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: StoreBackend,

    /// File path for the file backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Dragonfly URL for the dragonfly backend.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Key for the dragonfly backend.
    #[serde(default = "default_store_key")]
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            dragonfly_url: default_dragonfly_url(),
            key: default_store_key(),
        }
    }
}

/// HTTP bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the bridge.
    #[serde(default = "default_bridge_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_bridge_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            timeout_ms: default_bridge_timeout_ms(),
        }
    }
}

/// Status API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to serve the status API.
    #[serde(default)]
    pub enabled: bool,

    /// Bind host.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_safety_margin() -> f64 {
    1.0
}

fn default_plan_name() -> String {
    "agriculture".to_owned()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".tycoon/progress.json")
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_store_key() -> String {
    tycoon_store::dragonfly::DEFAULT_KEY.to_owned()
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:7300".to_owned()
}

const fn default_bridge_timeout_ms() -> u64 {
    5000
}

fn default_observer_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}
