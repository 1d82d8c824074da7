//! Default configuration values.

use crate::schema::*;
use flowmetrics_common::LoggingConfig;

/// Default seconds between refreshes.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Default period identifier.
pub const DEFAULT_PERIOD: &str = "mes";

/// Default calendar timezone.
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// Default ranking length.
pub const DEFAULT_TOP_USERS_LIMIT: usize = 5;

/// Default label language.
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// Default upper bound of one pipeline run.
pub const DEFAULT_PIPELINE_TIMEOUT_SECS: u64 = 60;

/// Average plan duration reported when no plan declares one.
pub const FALLBACK_AVG_PLAN_DURATION: f64 = 4.4;

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            refresh: RefreshConfig::default(),
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Rest,
            url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            rate_limit_per_sec: 20,
            max_idle_per_host: 10,
            fixture_path: None,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            default_period: DEFAULT_PERIOD.to_string(),
            pipeline_timeout_secs: DEFAULT_PIPELINE_TIMEOUT_SECS,
            output_path: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            top_users_limit: DEFAULT_TOP_USERS_LIMIT,
            fallback_avg_plan_duration: FALLBACK_AVG_PLAN_DURATION,
        }
    }
}
