use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::OtgConfig;
use crate::error::{AppError, Result};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/otg-hal/config.json";

/// Configuration store backed by a JSON file
///
/// Uses `ArcSwap` for lock-free reads. A missing file is not an error, the
/// built-in defaults are used instead.
#[derive(Clone)]
pub struct ConfigStore {
    cache: Arc<ArcSwap<OtgConfig>>,
}

impl ConfigStore {
    /// Load configuration from `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let config = Self::read_config(path).await?;
        Ok(Self {
            cache: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    async fn read_config(path: &Path) -> Result<OtgConfig> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let config = serde_json::from_str(&json)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(OtgConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get current configuration (lock-free)
    pub fn get(&self) -> Arc<OtgConfig> {
        self.cache.load_full()
    }
}
