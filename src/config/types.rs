use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{
    DEFAULT_DISK_CAPACITY_BYTES, DEFAULT_MEMORY_MAX_COST_BYTES, DEFAULT_MEMORY_MAX_ITEMS,
    DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Loopback address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (0 picks an ephemeral port)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    1234
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Directory holding the disk tier (`~` is expanded)
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Disk tier capacity in bytes
    #[serde(default = "default_disk_capacity")]
    pub disk_capacity_bytes: u64,

    /// Entry lifetime in seconds, applied to both tiers
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of entries in memory
    #[serde(default = "default_memory_max_items")]
    pub memory_max_items: usize,

    /// Maximum combined body size in memory
    #[serde(default = "default_memory_max_cost")]
    pub memory_max_cost_bytes: usize,

    /// Seconds between expired-entry sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("~/.cache/hlsproxy")
}
fn default_disk_capacity() -> u64 {
    DEFAULT_DISK_CAPACITY_BYTES
}
fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}
fn default_memory_max_items() -> usize {
    DEFAULT_MEMORY_MAX_ITEMS
}
fn default_memory_max_cost() -> usize {
    DEFAULT_MEMORY_MAX_COST_BYTES
}
fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            disk_capacity_bytes: default_disk_capacity(),
            ttl_secs: default_ttl_secs(),
            memory_max_items: default_memory_max_items(),
            memory_max_cost_bytes: default_memory_max_cost(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// Cache directory with a leading `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        let raw = self.dir.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Per-request timeout for origin fetches
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("hlsproxy/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
