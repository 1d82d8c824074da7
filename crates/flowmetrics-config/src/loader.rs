//! Configuration loading and environment overrides.

use crate::schema::{BackendKind, Config};
use flowmetrics_common::{FlowMetricsError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "FLOWMETRICS_CONFIG";

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
    /// JSON (`.json`)
    Json,
}

impl ConfigFormat {
    /// Infers the format from a file extension; YAML when unknown.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Parses configuration text in this format.
    pub fn parse(self, content: &str) -> Result<Config> {
        match self {
            Self::Yaml => serde_yaml::from_str(content)
                .map_err(|e| FlowMetricsError::config_with_source("Invalid YAML configuration", e)),
            Self::Toml => toml::from_str(content)
                .map_err(|e| FlowMetricsError::config_with_source("Invalid TOML configuration", e)),
            Self::Json => Ok(serde_json::from_str(content)?),
        }
    }
}

/// Reads a configuration file.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this loader reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads configuration from file, without environment overrides.
    pub async fn load(&self) -> Result<Config> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FlowMetricsError::config_with_source(
                format!("Cannot read configuration file {}", self.path.display()),
                e,
            )
        })?;

        let config = ConfigFormat::from_path(&self.path).parse(&content)?;
        info!(path = %self.path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Applies `FLOWMETRICS_*` environment overrides on top of `config`.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Applies overrides using `lookup` as the variable source.
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("FLOWMETRICS_BACKEND_URL") {
        config.backend.url = url;
    }
    if let Some(api_key) = lookup("FLOWMETRICS_API_KEY") {
        config.backend.api_key = api_key;
    }
    if let Some(path) = lookup("FLOWMETRICS_FIXTURE") {
        config.backend.kind = BackendKind::Fixture;
        config.backend.fixture_path = Some(PathBuf::from(path));
    }
    if let Some(period) = lookup("FLOWMETRICS_PERIOD") {
        config.refresh.default_period = period;
    }
    if let Some(secs) = lookup("FLOWMETRICS_REFRESH_SECS") {
        match secs.parse() {
            Ok(value) => config.refresh.interval_secs = value,
            Err(_) => warn!(value = %secs, "Ignoring non-numeric FLOWMETRICS_REFRESH_SECS"),
        }
    }
    if let Some(path) = lookup("FLOWMETRICS_OUTPUT") {
        config.refresh.output_path = Some(PathBuf::from(path));
    }
    if let Some(timezone) = lookup("FLOWMETRICS_TIMEZONE") {
        config.data.timezone = timezone;
    }
    if let Some(language) = lookup("FLOWMETRICS_LANGUAGE") {
        config.data.language = language;
    }
}

/// Loads configuration from `FLOWMETRICS_CONFIG` (or defaults when unset),
/// applies environment overrides, and validates the result.
pub async fn load_from_env() -> Result<Config> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => ConfigLoader::new(path).load().await?,
        Err(_) => {
            debug!("{CONFIG_PATH_ENV} not set, starting from defaults");
            Config::default()
        }
    };

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}
