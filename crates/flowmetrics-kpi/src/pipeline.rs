//! Pipeline entry point: resolve → fetch → bucketize and aggregate →
//! assemble.

use crate::aggregator::Aggregator;
use crate::data_fetcher::RawFetcher;
use crate::memory_source::MemorySource;
use crate::period::{PeriodId, PeriodResolver};
use crate::rest_source::RestSource;
use crate::snapshot::{KpiSnapshot, SnapshotAssembler};
use crate::traits::RowSource;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use flowmetrics_common::{parse_timezone, FlowMetricsError, Result};
use flowmetrics_config::{
    BackendKind, Config, DEFAULT_LANGUAGE, DEFAULT_PIPELINE_TIMEOUT_SECS, DEFAULT_TOP_USERS_LIMIT,
    FALLBACK_AVG_PLAN_DURATION,
};
use flowmetrics_i18n::Localizer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Settings the pipeline needs from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSettings {
    /// Local calendar.
    pub timezone: Tz,
    /// Label language.
    pub language: String,
    /// Ranking length.
    pub top_users_limit: usize,
    /// Average plan duration when no plan declares one.
    pub fallback_avg_plan_duration: f64,
    /// Upper bound of one run.
    pub pipeline_timeout: Duration,
}

impl Default for KpiSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            language: DEFAULT_LANGUAGE.to_string(),
            top_users_limit: DEFAULT_TOP_USERS_LIMIT,
            fallback_avg_plan_duration: FALLBACK_AVG_PLAN_DURATION,
            pipeline_timeout: Duration::from_secs(DEFAULT_PIPELINE_TIMEOUT_SECS),
        }
    }
}

impl KpiSettings {
    /// Extracts pipeline settings from a validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            timezone: parse_timezone(&config.data.timezone)?,
            language: config.data.language.clone(),
            top_users_limit: config.data.top_users_limit,
            fallback_avg_plan_duration: config.data.fallback_avg_plan_duration,
            pipeline_timeout: Duration::from_secs(config.refresh.pipeline_timeout_secs),
        })
    }
}

/// The KPI pipeline. Cheap to share behind an `Arc`; every run is
/// independent.
#[derive(Debug)]
pub struct KpiPipeline {
    resolver: PeriodResolver,
    fetcher: RawFetcher,
    aggregator: Aggregator,
    assembler: SnapshotAssembler,
    pipeline_timeout: Duration,
}

impl KpiPipeline {
    /// Creates a pipeline reading from `source`.
    pub fn new(source: Arc<dyn RowSource>, settings: KpiSettings) -> Result<Self> {
        let localizer = Arc::new(Localizer::new(&settings.language)?);

        Ok(Self {
            resolver: PeriodResolver::new(settings.timezone),
            fetcher: RawFetcher::new(source),
            aggregator: Aggregator::new(
                Arc::clone(&localizer),
                settings.top_users_limit,
                settings.fallback_avg_plan_duration,
            ),
            assembler: SnapshotAssembler::new(
                localizer,
                settings.timezone,
                settings.fallback_avg_plan_duration,
            ),
            pipeline_timeout: settings.pipeline_timeout,
        })
    }

    /// Creates a pipeline over the backend named by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn RowSource> = match config.backend.kind {
            BackendKind::Rest => Arc::new(RestSource::from_config(&config.backend)?),
            BackendKind::Fixture => {
                let path = config.backend.fixture_path.as_ref().ok_or_else(|| {
                    FlowMetricsError::config("Fixture backend requires backend.fixture_path")
                })?;
                Arc::new(MemorySource::from_fixture_file(path).await?)
            }
        };

        info!(source = source.name(), timezone = %config.data.timezone, "KPI pipeline ready");
        Self::new(source, KpiSettings::from_config(config)?)
    }

    /// Name of the row source in use.
    pub fn source_name(&self) -> &'static str {
        self.fetcher.source_name()
    }

    /// Runs the pipeline for `period` at the current time.
    pub async fn run(&self, period: PeriodId) -> KpiSnapshot {
        self.run_at(period, Utc::now()).await
    }

    /// Runs the pipeline for `period` as of `now`.
    ///
    /// Never fails: any error is logged and replaced by the neutral
    /// snapshot.
    #[instrument(skip(self), fields(source = self.source_name()))]
    pub async fn run_at(&self, period: PeriodId, now: DateTime<Utc>) -> KpiSnapshot {
        match self.try_run_at(period, now).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, %period, "KPI pipeline failed, serving neutral snapshot");
                self.assembler.fallback(period, now)
            }
        }
    }

    /// Runs the pipeline for `period` as of `now`, surfacing failures.
    ///
    /// Fails when the run exceeds the configured timeout or when every
    /// backend query failed.
    pub async fn try_run_at(&self, period: PeriodId, now: DateTime<Utc>) -> Result<KpiSnapshot> {
        let spec = self.resolver.resolve(period, now);

        let raw = tokio::time::timeout(self.pipeline_timeout, self.fetcher.fetch(spec.start_utc()))
            .await
            .map_err(|_| {
                FlowMetricsError::aggregation(format!(
                    "KPI fetch exceeded {}s",
                    self.pipeline_timeout.as_secs()
                ))
            })?;

        if raw.all_failed() {
            return Err(FlowMetricsError::backend("Every backend query failed"));
        }
        if !raw.failed_queries.is_empty() {
            warn!(failed = ?raw.failed_queries, "Some KPI queries failed, using defaults for them");
        }

        let aggregates = self.aggregator.aggregate(&spec, &raw);
        let snapshot = self.assembler.assemble(period, &raw, aggregates, now);

        info!(
            %period,
            total_users = snapshot.total_users,
            period_users = snapshot.period_users,
            buckets = snapshot.user_acquisition_trend.len(),
            "KPI snapshot assembled"
        );
        Ok(snapshot)
    }
}
