//! Lock-free configuration sharing with arc-swap.

use crate::loader::{apply_env_overrides, ConfigLoader};
use crate::schema::Config;
use arc_swap::ArcSwap;
use flowmetrics_common::Result;
use std::sync::Arc;
use tracing::info;

/// Holds the active configuration; readers never block writers.
pub struct ConfigCache {
    config: ArcSwap<Config>,
}

impl ConfigCache {
    /// Creates a cache around an already validated configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Gets the current configuration.
    pub fn get(&self) -> Arc<Config> {
        self.config.load_full()
    }

    /// Replaces the configuration after validating it.
    ///
    /// An invalid configuration is rejected and the current one kept.
    pub fn update(&self, config: Config) -> Result<()> {
        config.validate()?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Re-reads the configuration file, applies environment overrides and
    /// swaps the result in when valid.
    pub async fn reload(&self, loader: &ConfigLoader) -> Result<Arc<Config>> {
        let mut config = loader.load().await?;
        apply_env_overrides(&mut config);
        self.update(config)?;
        info!(path = %loader.path().display(), "Configuration reloaded");
        Ok(self.get())
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
