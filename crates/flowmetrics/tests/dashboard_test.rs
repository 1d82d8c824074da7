//! Integration tests for the dashboard context and refresher.

use chrono::Utc;
use flowmetrics::{write_snapshot, DashboardContext};
use flowmetrics_common::test_utils::{init_test_logging, row_fixtures};
use flowmetrics_config::{Config, ConfigLoader};
use flowmetrics_kpi::{KpiPipeline, KpiSettings, MemorySource, PeriodId, Table};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn context_with(config: Config) -> DashboardContext {
    let source = MemorySource::new().with_rows(
        Table::UserProfiles,
        vec![
            row_fixtures::profile("u1", Some("Ana"), Utc::now()),
            row_fixtures::profile("u2", None, Utc::now()),
        ],
    );
    let pipeline = KpiPipeline::new(Arc::new(source), KpiSettings::default()).unwrap();
    DashboardContext::new(pipeline, config)
}

async fn wait_for_period(context: &DashboardContext, period: PeriodId) {
    timeout(Duration::from_secs(5), async {
        loop {
            if context.latest().is_some_and(|s| s.period == period) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_refresh_once_publishes_snapshot() {
    init_test_logging();
    let context = context_with(Config::default());
    assert!(context.latest().is_none());
    assert_eq!(context.period(), PeriodId::Month);

    let snapshot = context.refresh_once().await;
    assert_eq!(snapshot.total_users, 2);
    assert_eq!(snapshot.period, PeriodId::Month);
    assert!(Arc::ptr_eq(&snapshot, &context.latest().unwrap()));
}

#[tokio::test]
async fn test_refresh_exports_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("kpi.json");

    let mut config = Config::default();
    config.refresh.output_path = Some(output.clone());
    let context = context_with(config);
    context.refresh_once().await;

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(exported["totalUsers"], 2);
    assert_eq!(exported["period"], "month");
    assert_eq!(exported["degraded"], false);
}

#[tokio::test]
async fn test_write_snapshot_into_missing_dir_fails() {
    let context = context_with(Config::default());
    let snapshot = context.refresh_once().await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("missing").join("kpi.json");
    assert!(write_snapshot(&target, &snapshot).await.is_err());
}

#[tokio::test]
async fn test_refresher_follows_period_selection() {
    let mut config = Config::default();
    config.refresh.interval_secs = 3600;
    let context = Arc::new(context_with(config));

    let refresher = context.spawn_refresher();
    wait_for_period(&context, PeriodId::Month).await;

    context.select_period(PeriodId::Week);
    wait_for_period(&context, PeriodId::Week).await;
    assert_eq!(context.latest().unwrap().user_acquisition_trend.len(), 7);

    context.shutdown();
    assert!(context.is_shutting_down());
    timeout(Duration::from_secs(5), refresher)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_initial_period_does_not_trigger_an_extra_refresh() {
    let mut config = Config::default();
    config.refresh.interval_secs = 3600;
    let context = Arc::new(context_with(config).with_period(PeriodId::Week));
    assert_eq!(context.period(), PeriodId::Week);

    let refresher = context.spawn_refresher();
    wait_for_period(&context, PeriodId::Week).await;
    let first = context.latest().unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(Arc::ptr_eq(&first, &context.latest().unwrap()));

    context.shutdown();
    timeout(Duration::from_secs(5), refresher)
        .await
        .unwrap()
        .unwrap();
}

async fn wait_for_file(path: &std::path::Path) {
    timeout(Duration::from_secs(5), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

fn write_config(path: &std::path::Path, config: &Config) {
    std::fs::write(path, serde_json::to_string(config).unwrap()).unwrap();
}

#[tokio::test]
async fn test_reload_applies_new_interval_and_output() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("flowmetrics.json");
    let output = dir.path().join("kpi.json");

    let mut config = Config::default();
    config.backend.api_key = "key".to_string();
    config.refresh.interval_secs = 3600;
    write_config(&config_path, &config);

    let context = Arc::new(
        context_with(config.clone()).with_config_loader(ConfigLoader::new(&config_path)),
    );
    let refresher = context.spawn_refresher();
    wait_for_period(&context, PeriodId::Month).await;
    assert!(!output.exists());

    config.refresh.interval_secs = 1;
    config.refresh.output_path = Some(output.clone());
    write_config(&config_path, &config);

    let reloaded = context.reload_config().await.unwrap();
    assert_eq!(reloaded.refresh.interval_secs, 1);
    assert_eq!(context.config().refresh.output_path, Some(output.clone()));

    // The reload wakes the refresher, which exports to the new path.
    wait_for_file(&output).await;

    // Only the shortened interval can export again within the timeout.
    std::fs::remove_file(&output).unwrap();
    wait_for_file(&output).await;

    context.shutdown();
    timeout(Duration::from_secs(5), refresher)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_reload_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("flowmetrics.json");

    let mut config = Config::default();
    config.backend.api_key = "key".to_string();
    config.refresh.interval_secs = 30;
    let context = context_with(config.clone()).with_config_loader(ConfigLoader::new(&config_path));

    config.refresh.interval_secs = 0;
    write_config(&config_path, &config);

    assert!(context.reload_config().await.is_err());
    assert_eq!(context.config().refresh.interval_secs, 30);
}

#[tokio::test]
async fn test_reload_without_config_file_fails() {
    let context = context_with(Config::default());
    assert!(context.reload_config().await.is_err());
}

#[tokio::test]
async fn test_fixture_backend_without_path_is_rejected() {
    let mut config = Config::default();
    config.backend.kind = flowmetrics_config::BackendKind::Fixture;
    assert!(DashboardContext::from_config(config).await.is_err());
}
