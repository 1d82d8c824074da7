//! FlowMetrics - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use flowmetrics::DashboardContext;
use flowmetrics_common::{bootstrap_dispatch, init_logging};
use flowmetrics_config::{apply_env_overrides, load_from_env, Config, ConfigLoader};
use flowmetrics_kpi::PeriodId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "FLOWMETRICS_CONFIG")]
    config: Option<PathBuf>,

    /// Period to compute: hoje, semana, mes, ano or all
    #[arg(short, long)]
    period: Option<String>,

    /// Compute one snapshot, print it as JSON and exit
    #[arg(long)]
    once: bool,
}

async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(load_from_env().await?);
    };

    let mut config = ConfigLoader::new(&path)
        .load()
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Waits for Ctrl-C, reloading the configuration on every SIGHUP.
#[cfg(unix)]
async fn wait_for_shutdown(context: &DashboardContext) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                return result.context("Failed to listen for shutdown signal");
            }
            _ = hangup.recv() => {
                if let Err(e) = context.reload_config().await {
                    warn!(error = %e, "Configuration reload failed, keeping the current one");
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_context: &DashboardContext) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = {
        let _bootstrap = tracing::dispatcher::set_default(&bootstrap_dispatch());
        load_config(args.config.clone()).await?
    };
    let _log_guard = init_logging(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting FlowMetrics");
    match &args.config {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Configuration loaded from defaults and environment"),
    }

    let mut context = DashboardContext::from_config(config)
        .await
        .context("Failed to build the KPI pipeline")?;
    if let Some(path) = &args.config {
        context = context.with_config_loader(ConfigLoader::new(path));
    }
    if let Some(period) = args.period.as_deref() {
        context = context.with_period(PeriodId::parse(period));
    }
    let context = Arc::new(context);

    if args.once {
        let snapshot = context.refresh_once().await;
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    let refresher = context.spawn_refresher();

    wait_for_shutdown(&context).await?;
    info!("Shutdown signal received");

    context.shutdown();
    refresher.await?;

    info!("FlowMetrics stopped");
    Ok(())
}
