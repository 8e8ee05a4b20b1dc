//! Process configuration
//!
//! One TOML file with an `[engine]` and a `[server]` table. Lookup order:
//! the path in `DIYAFA_CONFIG`, then `<config dir>/diyafa.toml`, then
//! built-in defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use diyafa_core::{ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "DIYAFA_CONFIG";

/// Config file name inside the platform config dir
pub const CONFIG_FILE: &str = "diyafa.toml";

/// Default pause between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// SQLite file; the platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Catalog loaded into an empty store at startup
    pub seed_catalog: Option<PathBuf>,
    /// Seconds between pending-expiry sweeps
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], diyafa_net::DEFAULT_PORT)),
            database_path: None,
            seed_catalog: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Parse from TOML content and validate
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolve the config file and load it. Returns the file used, if any.
    pub fn discover(config_dir: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        if let Some(path) = config_dir.map(|dir| dir.join(CONFIG_FILE)) {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.server.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_secs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
