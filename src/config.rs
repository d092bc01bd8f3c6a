//! Configuration for logrelay
//!
//! Centralized configuration with sensible defaults. Loaded from a YAML file
//! (see [`Config::load`]) or assembled with [`Config::builder`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RelayError, Result};

/// Environment variable naming the config file
pub const CONFIG_FILE_ENV: &str = "CONFIGFILE";

/// Config file used when neither `--config` nor `CONFIGFILE` is given
pub const DEFAULT_CONFIG_FILE: &str = "./config.yml";

/// Main configuration for a logrelay instance
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address (host:port)
    pub listen_address: String,

    /// Grace period for in-flight HTTP requests on shutdown (seconds)
    pub shutdown_timeout_secs: u64,

    // -------------------------------------------------------------------------
    // Sections
    // -------------------------------------------------------------------------
    pub logger: LoggerConfig,

    pub storage: StorageConfig,

    pub telegram_bot: TelegramBotConfig,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct LoggerConfig {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Embedded database settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory for all data files (WAL, SSTables)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    /// fsync the WAL after this many entries (1 = every write)
    pub wal_sync_every: usize,

    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    /// Compact once this many SSTables exist (0 disables compaction)
    pub compaction_threshold: usize,
}

/// Telegram bot settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TelegramBotConfig {
    /// Bot token from @BotFather
    pub token: String,

    /// Chat allowed to run administrative commands (0 = nobody)
    pub superuser_chat_id: i64,

    /// Bot API base URL; the token and method are appended
    pub api_url: String,

    /// Long-poll timeout for getUpdates (seconds)
    pub poll_timeout_secs: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:80".to_string(),
            shutdown_timeout_secs: 10,
            logger: LoggerConfig::default(),
            storage: StorageConfig::default(),
            telegram_bot: TelegramBotConfig::default(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./logrelay_data"),
            wal_sync_every: 1,
            memtable_size_limit: 4 * 1024 * 1024, // 4 MB
            compaction_threshold: 8,
        }
    }
}

impl Default for TelegramBotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            superuser_chat_id: 0,
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 60,
        }
    }
}

impl StorageConfig {
    /// WAL sync strategy derived from `wal_sync_every`
    pub fn wal_sync_strategy(&self) -> WalSyncStrategy {
        if self.wal_sync_every <= 1 {
            WalSyncStrategy::EveryWrite
        } else {
            WalSyncStrategy::EveryNEntries {
                count: self.wal_sync_every,
            }
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load and validate a YAML config file.
    ///
    /// Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without validating
    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        validate_host_port(&self.listen_address)?;

        if self.telegram_bot.token.trim().is_empty() {
            return Err(RelayError::Config("telegramBot.token is required".to_string()));
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(RelayError::Config("storage.dataDir is required".to_string()));
        }

        Ok(())
    }

    /// HTTP graceful shutdown deadline
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// `host:port` with a non-empty host and a numeric port
fn validate_host_port(addr: &str) -> Result<()> {
    let invalid = || RelayError::Config(format!("invalid listen address: {:?}", addr));

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;

    Ok(())
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.storage.wal_sync_every = match strategy {
            WalSyncStrategy::EveryWrite => 1,
            WalSyncStrategy::EveryNEntries { count } => count,
        };
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.storage.memtable_size_limit = size;
        self
    }

    /// Set the SSTable count that triggers compaction
    pub fn compaction_threshold(mut self, count: usize) -> Self {
        self.config.storage.compaction_threshold = count;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_address(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_address = addr.into();
        self
    }

    /// Set the graceful shutdown deadline (in seconds)
    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// Set the bot token
    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.telegram_bot.token = token.into();
        self
    }

    /// Set the superuser chat ID
    pub fn superuser_chat_id(mut self, chat_id: i64) -> Self {
        self.config.telegram_bot.superuser_chat_id = chat_id;
        self
    }

    /// Set the bot API base URL
    pub fn bot_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.telegram_bot.api_url = url.into();
        self
    }

    /// Set the getUpdates long-poll timeout (in seconds)
    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.telegram_bot.poll_timeout_secs = secs;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logger.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
