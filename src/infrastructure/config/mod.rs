//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::application::errors::ConfigError;
use crate::infrastructure::storage::RetryConfig;

/// Host configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub plugins: PluginConfig,
    pub storage: StorageConfig,
    pub lifecycle: LifecycleConfig,
    pub dashboard: DashboardConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "plugbot".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    /// Discovery roots, searched in this order
    pub sources: Vec<String>,
    /// Allow-list of plugin keys; empty means each plugin's own default
    pub enabled: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            sources: vec!["plugins".to_string()],
            enabled: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    /// Connection descriptor, e.g. `sqlite://./plugbot.db`
    pub url: Option<String>,
    /// Refuse to start instead of falling back to memory
    pub require_durable: bool,
    pub connect_retries: u32,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: Some("sqlite://./plugbot.db".to_string()),
            require_durable: false,
            connect_retries: 5,
            retry_initial_ms: 500,
            retry_max_ms: 10_000,
        }
    }
}

impl StorageConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.connect_retries,
            initial_delay: Duration::from_millis(self.retry_initial_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
            ..RetryConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LifecycleConfig {
    /// Upper bound for each plugin shutdown hook
    pub hook_timeout_ms: u64,
    /// How long in-flight event dispatches may finish at shutdown
    pub drain_grace_ms: u64,
    /// How long background tasks may finish before being aborted
    pub task_grace_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            hook_timeout_ms: 5_000,
            drain_grace_ms: 3_000,
            task_grace_ms: 3_000,
        }
    }
}

impl LifecycleConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn task_grace(&self) -> Duration {
        Duration::from_millis(self.task_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DashboardConfig {
    /// Template root of the host's own admin pages
    pub template_root: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from("templates"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }

    /// Overlay environment variables on top of file or default values
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(name) = var("BOT_NAME") {
            self.bot.name = name;
        }

        if let Some(level) = var("LOG_LEVEL") {
            self.bot.log_level = level;
        }

        if let Some(sources) = var("PLUGIN_PACKAGES") {
            let sources = split_list(&sources);
            if !sources.is_empty() {
                self.plugins.sources = sources;
            }
        }

        if let Some(enabled) = var("ENABLED_PLUGINS") {
            self.plugins.enabled = split_list(&enabled);
        }

        if let Some(url) = var("DATABASE_URL") {
            let url = url.trim();
            self.storage.url = if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            };
        }
    }

    /// Log filter: `rust_log` (the `RUST_LOG` value) when it parses, else
    /// `bot.log-level`, else `info`
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        rust_log
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .and_then(|d| EnvFilter::try_new(d).ok())
            .or_else(|| EnvFilter::try_new(&self.bot.log_level).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugins.sources.is_empty() {
            return Err(ConfigError::InvalidValue(
                "plugins.sources must name at least one source".to_string(),
            ));
        }
        if self.lifecycle.hook_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "lifecycle.hook-timeout-ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Comma separated list with blanks dropped
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
