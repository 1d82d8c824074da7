//! Integration tests for flowmetrics-config crate.

use flowmetrics_common::test_utils::config_fixtures;
use flowmetrics_config::{BackendKind, Config, ConfigCache, ConfigFormat, ConfigLoader};
use std::io::Write;

#[test]
fn test_default_config_validation() {
    let mut config = Config::default();

    // Default config should fail validation due to the empty API key
    assert!(config.validate().is_err());

    config.backend.api_key = "test_api_key".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_cache() {
    let mut config = Config::default();
    config.backend.api_key = "test_api_key".to_string();
    let cache = ConfigCache::new(config.clone());

    let cached_config = cache.get();
    assert_eq!(cached_config.data.language, config.data.language);

    let mut new_config = config;
    new_config.data.language = "en-US".to_string();
    cache.update(new_config).unwrap();
    assert_eq!(cache.get().data.language, "en-US");
}

#[test]
fn test_config_cache_rejects_invalid_update() {
    let mut config = Config::default();
    config.backend.api_key = "test_api_key".to_string();
    let cache = ConfigCache::new(config.clone());

    let mut broken = config;
    broken.refresh.interval_secs = 0;
    assert!(cache.update(broken).is_err());
    assert_eq!(cache.get().refresh.interval_secs, 30);
}

#[test]
fn test_minimal_yaml_fills_defaults() {
    let config = ConfigFormat::Yaml
        .parse(config_fixtures::minimal_config_yaml())
        .unwrap();

    assert_eq!(config.backend.api_key, "test_api_key");
    assert_eq!(config.backend.kind, BackendKind::Rest);
    assert_eq!(config.refresh.interval_secs, 30);
    assert_eq!(config.data.top_users_limit, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_yaml_and_toml_agree() {
    let yaml = ConfigFormat::Yaml
        .parse(config_fixtures::full_config_yaml())
        .unwrap();
    let toml = ConfigFormat::Toml
        .parse(config_fixtures::full_config_toml())
        .unwrap();

    assert_eq!(yaml, toml);
    assert_eq!(yaml.refresh.default_period, "semana");
    assert!(yaml.logging.json_format);
}

#[tokio::test]
async fn test_loader_reads_file_by_extension() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(config_fixtures::full_config_toml().as_bytes())
        .unwrap();

    let config = ConfigLoader::new(file.path()).load().await.unwrap();
    assert_eq!(config.backend.url, "https://project.supabase.co");
    assert_eq!(config.refresh.interval_secs, 60);
}

#[tokio::test]
async fn test_loader_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigLoader::new(dir.path().join("absent.yaml")).load().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_reload_swaps_in_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flowmetrics.json");

    let mut config = Config::default();
    config.backend.api_key = "saved".to_string();
    config.data.timezone = "UTC".to_string();
    std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

    let cache = ConfigCache::default();
    let reloaded = cache.reload(&ConfigLoader::new(&path)).await.unwrap();
    assert_eq!(reloaded.data.timezone, "UTC");
    assert_eq!(cache.get().data.timezone, "UTC");
}

#[tokio::test]
async fn test_reload_keeps_current_config_when_file_is_invalid() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(b"refresh:\n  interval_secs: 0\n").unwrap();

    let mut config = Config::default();
    config.backend.api_key = "test_api_key".to_string();
    let cache = ConfigCache::new(config);

    assert!(cache.reload(&ConfigLoader::new(file.path())).await.is_err());
    assert_eq!(cache.get().refresh.interval_secs, 30);
}
