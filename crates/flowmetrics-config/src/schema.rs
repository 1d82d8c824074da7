//! Configuration schema definitions using serde.

use flowmetrics_common::{LoggingConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for FlowMetrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where KPI rows are read from.
    pub backend: BackendConfig,
    /// Periodic refresh configuration.
    pub refresh: RefreshConfig,
    /// Aggregation and presentation settings.
    pub data: DataConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which row source backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// PostgREST-compatible HTTP backend.
    Rest,
    /// Static JSON fixture file, for offline and demo use.
    Fixture,
}

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Source kind.
    pub kind: BackendKind,
    /// Project base URL, e.g. `https://<project>.supabase.co`.
    pub url: String,
    /// Anonymous or service API key.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum requests per second issued to the backend.
    pub rate_limit_per_sec: u32,
    /// Idle pooled connections kept per host.
    pub max_idle_per_host: usize,
    /// Fixture file used when `kind` is `fixture`.
    pub fixture_path: Option<PathBuf>,
}

/// Refresh configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between pipeline runs.
    pub interval_secs: u64,
    /// Period selected at startup (`hoje`, `semana`, `mes`, `ano`, `total`).
    pub default_period: String,
    /// Upper bound for one fetch-and-aggregate run before it is abandoned.
    pub pipeline_timeout_secs: u64,
    /// File the latest snapshot is written to as JSON, if any.
    pub output_path: Option<PathBuf>,
}

/// Aggregation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// IANA timezone giving the local calendar used for buckets.
    pub timezone: String,
    /// Language tag for labels.
    pub language: String,
    /// Number of users in the study-time ranking.
    pub top_users_limit: usize,
    /// Average plan duration reported when no plan declares one.
    pub fallback_avg_plan_duration: f64,
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        crate::validator::ConfigValidator::validate(self)
    }
}
