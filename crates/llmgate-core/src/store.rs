use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use llmgate_common::{Config, ConfigError};

/// Where the configuration JSON comes from. The engine never writes it.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Path(PathBuf),
    Inline(String),
}

impl ConfigSource {
    fn read(&self) -> Result<String, ConfigError> {
        match self {
            ConfigSource::Path(path) => Ok(std::fs::read_to_string(path)?),
            ConfigSource::Inline(raw) => Ok(raw.clone()),
        }
    }
}

/// Holds the active configuration snapshot. Readers load a pointer and
/// keep that snapshot for their whole request; reload validates fully,
/// then swaps the pointer, so a snapshot is never partially updated.
#[derive(Debug)]
pub struct ConfigStore {
    source: ConfigSource,
    current: ArcSwap<Config>,
}

impl ConfigStore {
    /// Read, parse, and validate the source. Fails without activating
    /// anything if the source is unreadable or invalid.
    pub fn load(source: ConfigSource) -> Result<Self, ConfigError> {
        let config = Config::from_json(&source.read()?)?;
        info!(
            providers = config.providers.len(),
            slots = config.routing.len(),
            "config loaded"
        );
        Ok(Self {
            source,
            current: ArcSwap::from_pointee(config),
        })
    }

    pub fn current(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Re-read the source and swap the snapshot atomically. On any
    /// failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = Config::from_json(&self.source.read()?)?;
        info!(
            providers = config.providers.len(),
            slots = config.routing.len(),
            "config reloaded"
        );
        self.current.store(Arc::new(config));
        Ok(())
    }
}
