//! Daemon configuration file.
//!
//! ```toml
//! presence_file = "presence.toml"
//! tick_ms = 100
//! reload_ms = 1000
//!
//! [client]
//! client_id = "1383904378154651768"
//! min_send_interval_ms = 15000
//! ```
//!
//! Relative paths are resolved against the directory holding the config.

use presence_client::SyncConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TICK_MS: u64 = 100;
const DEFAULT_RELOAD_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub client: SyncConfig,
    /// TOML file holding the presence to show.
    pub presence_file: PathBuf,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// How often the presence file is re-read.
    #[serde(default = "default_reload_ms")]
    pub reload_ms: u64,
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_reload_ms() -> u64 {
    DEFAULT_RELOAD_MS
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("client.client_id must be set")]
    MissingClientId,
    #[error("tick_ms must be greater than zero")]
    ZeroTick,
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    pub fn parse(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: DaemonConfig = toml::from_str(text)?;
        if config.client.client_id.is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if config.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if config.presence_file.is_relative() {
            config.presence_file = base.join(&config.presence_file);
        }
        if let Some(socket) = &config.client.socket_path
            && socket.is_relative()
        {
            config.client.socket_path = Some(base.join(socket));
        }
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_ms)
    }
}
