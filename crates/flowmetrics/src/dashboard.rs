//! Dashboard context: the latest snapshot, the selected period and the
//! periodic refresher that keeps them current.

use crate::error::AppResult;
use arc_swap::{ArcSwap, ArcSwapOption};
use flowmetrics_common::FlowMetricsError;
use flowmetrics_config::{Config, ConfigCache, ConfigLoader};
use flowmetrics_kpi::{KpiPipeline, KpiSnapshot, PeriodId};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Shared state of a running dashboard.
///
/// Readers call [`DashboardContext::latest`] at any time; only the
/// refresher (or an explicit [`DashboardContext::refresh_once`]) replaces
/// the snapshot, and a replacement is always a complete snapshot.
pub struct DashboardContext {
    pipeline: Arc<KpiPipeline>,
    config: ConfigCache,
    config_loader: Option<ConfigLoader>,
    latest: ArcSwapOption<KpiSnapshot>,
    period: ArcSwap<PeriodId>,
    refresh_requested: Notify,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("pipeline", &self.pipeline)
            .field("config", &"<ConfigCache>")
            .field("config_path", &self.config_loader.as_ref().map(ConfigLoader::path))
            .field("period", &self.period())
            .field("has_snapshot", &self.latest.load().is_some())
            .finish_non_exhaustive()
    }
}

impl DashboardContext {
    /// Creates a context around an existing pipeline.
    ///
    /// The initial period comes from `refresh.default_period`.
    pub fn new(pipeline: KpiPipeline, config: Config) -> Self {
        let period = PeriodId::parse(&config.refresh.default_period);
        Self {
            pipeline: Arc::new(pipeline),
            config: ConfigCache::new(config),
            config_loader: None,
            latest: ArcSwapOption::empty(),
            period: ArcSwap::from_pointee(period),
            refresh_requested: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the pipeline named by `config` and wraps it in a context.
    pub async fn from_config(config: Config) -> AppResult<Self> {
        let pipeline = KpiPipeline::from_config(&config).await?;
        Ok(Self::new(pipeline, config))
    }

    /// Sets the file [`Self::reload_config`] re-reads.
    #[must_use]
    pub fn with_config_loader(mut self, loader: ConfigLoader) -> Self {
        self.config_loader = Some(loader);
        self
    }

    /// Sets the initial period without waking the refresher.
    #[must_use]
    pub fn with_period(self, period: PeriodId) -> Self {
        self.period.store(Arc::new(period));
        self
    }

    /// Re-reads the configuration file and wakes the refresher.
    ///
    /// The refresh interval and the export path follow the new file from
    /// the next run on. Backend and calendar settings are bound to the
    /// pipeline and only change on restart. An invalid file is rejected
    /// and the current configuration kept.
    pub async fn reload_config(&self) -> AppResult<Arc<Config>> {
        let loader = self.config_loader.as_ref().ok_or_else(|| {
            FlowMetricsError::config("No configuration file to reload from")
        })?;

        let previous = self.config();
        let config = self.config.reload(loader).await?;
        if config.backend != previous.backend || config.data != previous.data {
            warn!("Backend and data settings changed; they apply after a restart");
        }

        self.refresh_requested.notify_one();
        Ok(config)
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<Config> {
        self.config.get()
    }

    /// Most recent snapshot, if a refresh has completed.
    pub fn latest(&self) -> Option<Arc<KpiSnapshot>> {
        self.latest.load_full()
    }

    /// Period the next refresh computes.
    pub fn period(&self) -> PeriodId {
        **self.period.load()
    }

    /// Switches the selected period and wakes the refresher.
    pub fn select_period(&self, period: PeriodId) {
        let previous = *self.period.swap(Arc::new(period));
        if previous != period {
            info!(from = %previous, to = %period, "Period selected");
        }
        self.refresh_requested.notify_one();
    }

    /// Runs the pipeline once for the selected period and publishes the
    /// result.
    ///
    /// Export failures are logged; the snapshot is published regardless.
    #[instrument(skip(self))]
    pub async fn refresh_once(&self) -> Arc<KpiSnapshot> {
        let period = self.period();
        let snapshot = Arc::new(self.pipeline.run(period).await);
        self.latest.store(Some(Arc::clone(&snapshot)));

        if let Some(path) = self.config().refresh.output_path.clone() {
            if let Err(e) = write_snapshot(&path, &snapshot).await {
                error!(error = %e, path = %path.display(), "Cannot export snapshot");
            }
        }

        debug!(%period, degraded = snapshot.degraded, "Snapshot published");
        snapshot
    }

    /// Starts the periodic refresher.
    ///
    /// Refreshes immediately, then every `refresh.interval_secs`, and
    /// early whenever a period is selected or the configuration reloaded.
    /// The interval is re-read after every run. Stops on
    /// [`Self::shutdown`].
    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let context = Arc::clone(self);

        tokio::spawn(async move {
            let mut every = refresh_interval(&context.config());
            let mut ticker = new_ticker(Instant::now(), every);
            info!(interval_secs = every.as_secs(), "Refresher started");

            loop {
                tokio::select! {
                    () = context.shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                    () = context.refresh_requested.notified() => ticker.reset(),
                }
                context.refresh_once().await;

                let wanted = refresh_interval(&context.config());
                if wanted != every {
                    info!(interval_secs = wanted.as_secs(), "Refresh interval changed");
                    every = wanted;
                    ticker = new_ticker(Instant::now() + wanted, wanted);
                }
            }

            info!("Refresher stopped");
        })
    }

    /// Asks the refresher to stop after its current run.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown was requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn refresh_interval(config: &Config) -> Duration {
    Duration::from_secs(config.refresh.interval_secs.max(1))
}

fn new_ticker(first: Instant, every: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(first, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Writes `snapshot` as pretty JSON to `path`, replacing the file
/// atomically.
pub async fn write_snapshot(path: &Path, snapshot: &KpiSnapshot) -> AppResult<()> {
    let rendered = serde_json::to_vec_pretty(snapshot)?;
    let path: PathBuf = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> AppResult<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&rendered)?;
        file.as_file().sync_all()?;
        file.persist(&path)
            .map_err(|e| FlowMetricsError::from(e.error))?;
        Ok(())
    })
    .await??;

    Ok(())
}
