//! Watcher configuration.
//!
//! Values come from defaults, then an optional TOML file, then CLI/env
//! overrides. [`WatcherConfig::resolve`] validates the result and turns
//! it into the settings the failover crate works with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_failover::{AddressParseError, ConnectionConfig, ControllerConfig, NodeAddress};
use vigil_protocol::Decoding;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Address(#[from] AddressParseError),

    #[error("unknown encoding '{0}'. valid options: utf-8, raw")]
    Encoding(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("fresh-start requires at least one host")]
    NoHosts,
}

/// Where the topology is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: u32,
    /// Empty means no AUTH.
    pub password: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            db: 0,
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatcherConfig {
    /// Nodes to watch as `host:port`; a bare host uses port 6379.
    pub hosts: Vec<String>,
    pub check_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Also used as the write timeout.
    pub read_timeout_ms: u64,
    /// Shared secret for the watched nodes. Empty means no AUTH.
    pub password: String,
    pub db: u32,
    pub read_chunk_size: usize,
    /// `utf-8` or `raw`.
    pub encoding: String,
    pub log_channel: String,
    /// Ignore and wipe any stored topology, starting from `hosts`.
    pub fresh_start: bool,
    pub store: StoreConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            check_interval_ms: 1000,
            connect_timeout_ms: 2000,
            read_timeout_ms: 2000,
            password: String::new(),
            db: 0,
            read_chunk_size: vigil_protocol::DEFAULT_CHUNK_SIZE,
            encoding: "utf-8".into(),
            log_channel: "log".into(),
            fresh_start: false,
            store: StoreConfig::default(),
        }
    }
}

/// Validated settings, ready to build the controller and store from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub controller: ControllerConfig,
    pub store_addr: NodeAddress,
    pub store_connection: ConnectionConfig,
    pub fresh_start: bool,
}

impl WatcherConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn resolve(&self) -> Result<Resolved, ConfigError> {
        if self.check_interval_ms == 0 {
            return Err(ConfigError::Zero("check-interval-ms"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Zero("connect-timeout-ms"));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Zero("read-timeout-ms"));
        }
        if self.read_chunk_size == 0 {
            return Err(ConfigError::Zero("read-chunk-size"));
        }

        let decoding = parse_encoding(&self.encoding)?;
        let seeds = self
            .hosts
            .iter()
            .map(|h| h.parse::<NodeAddress>())
            .collect::<Result<Vec<_>, _>>()?;
        if self.fresh_start && seeds.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        if self.store.port == 0 {
            return Err(ConfigError::Zero("store port"));
        }

        let base = ConnectionConfig {
            password: None,
            db: 0,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.read_timeout_ms),
            decoding,
            read_chunk_size: self.read_chunk_size,
        };

        Ok(Resolved {
            controller: ControllerConfig {
                seeds,
                check_interval: Duration::from_millis(self.check_interval_ms),
                connection: ConnectionConfig {
                    password: non_empty(&self.password),
                    db: self.db,
                    ..base.clone()
                },
                log_channel: self.log_channel.clone(),
            },
            store_addr: NodeAddress::new(self.store.host.clone(), self.store.port),
            store_connection: ConnectionConfig {
                password: non_empty(&self.store.password),
                db: self.store.db,
                ..base
            },
            fresh_start: self.fresh_start,
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

pub fn parse_encoding(input: &str) -> Result<Decoding, ConfigError> {
    match input.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(Decoding::Utf8),
        "raw" => Ok(Decoding::Raw),
        _ => Err(ConfigError::Encoding(input.to_string())),
    }
}
