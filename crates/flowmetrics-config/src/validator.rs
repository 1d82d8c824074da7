//! Runtime validation of loaded configuration.

use crate::schema::{BackendKind, Config};
use flowmetrics_common::{parse_timezone, FlowMetricsError, Result};
use tracing::debug;

/// Upper bound for the ranking length.
pub const MAX_TOP_USERS_LIMIT: usize = 50;

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a configuration, returning the first problem found.
    pub fn validate(config: &Config) -> Result<()> {
        Self::validate_backend(config)?;

        if config.refresh.interval_secs == 0 {
            return Err(FlowMetricsError::config(
                "refresh.interval_secs must be greater than 0",
            ));
        }

        if config.refresh.pipeline_timeout_secs == 0 {
            return Err(FlowMetricsError::config(
                "refresh.pipeline_timeout_secs must be greater than 0",
            ));
        }

        parse_timezone(&config.data.timezone)?;

        if config.data.language.trim().is_empty() {
            return Err(FlowMetricsError::config("data.language cannot be empty"));
        }

        if !(1..=MAX_TOP_USERS_LIMIT).contains(&config.data.top_users_limit) {
            return Err(FlowMetricsError::config(format!(
                "data.top_users_limit must be between 1 and {MAX_TOP_USERS_LIMIT}"
            )));
        }

        let fallback = config.data.fallback_avg_plan_duration;
        if !fallback.is_finite() || fallback < 0.0 {
            return Err(FlowMetricsError::config(
                "data.fallback_avg_plan_duration must be a non-negative number",
            ));
        }

        debug!("Configuration validated");
        Ok(())
    }

    fn validate_backend(config: &Config) -> Result<()> {
        let backend = &config.backend;
        match backend.kind {
            BackendKind::Rest => {
                let parsed = url::Url::parse(&backend.url).map_err(|e| {
                    FlowMetricsError::config_with_source(
                        format!("backend.url '{}' is not a valid URL", backend.url),
                        e,
                    )
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(FlowMetricsError::config(
                        "backend.url must use http or https",
                    ));
                }
                if backend.api_key.is_empty() {
                    return Err(FlowMetricsError::config("backend.api_key cannot be empty"));
                }
                if backend.rate_limit_per_sec == 0 {
                    return Err(FlowMetricsError::config(
                        "backend.rate_limit_per_sec must be greater than 0",
                    ));
                }
                if backend.timeout_secs == 0 {
                    return Err(FlowMetricsError::config(
                        "backend.timeout_secs must be greater than 0",
                    ));
                }
            }
            BackendKind::Fixture => {
                if backend.fixture_path.is_none() {
                    return Err(FlowMetricsError::config(
                        "backend.fixture_path is required for the fixture backend",
                    ));
                }
            }
        }
        Ok(())
    }
}
