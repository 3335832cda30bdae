//! Two-tier content cache.
//!
//! Resources fetched from origins are kept in a small in-memory LRU tier in
//! front of a larger on-disk tier. Both tiers are keyed by [`CacheKey`], the
//! SHA-256 of the origin URL, and both honour the same per-entry TTL.
//!
//! Tier failures are absorbed: a failed read is a miss and a failed write is
//! dropped. They are logged and published as [`CacheEvent`]s so they remain
//! observable.

mod disk;
mod events;
mod memory;
mod resource;

pub use disk::{DiskHit, DiskTier};
pub use events::{CacheEvent, Tier};
pub use memory::MemoryTier;
pub use resource::CachedResource;

use std::sync::Arc;
use std::time::Duration;

use hlsproxy_common::{CacheKey, Error, Result};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::CacheConfig;

/// Default disk tier capacity: 200 MiB.
pub const DEFAULT_DISK_CAPACITY_BYTES: u64 = 200 * 1024 * 1024;

/// Default entry lifetime in both tiers: 7 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default memory tier item bound.
pub const DEFAULT_MEMORY_MAX_ITEMS: usize = 25;

/// Size of one memory cost unit.
pub const MEMORY_COST_UNIT_BYTES: usize = 1024 * 1024;

/// Default memory tier cost bound: 25 units of 1 MiB.
pub const DEFAULT_MEMORY_MAX_COST_BYTES: usize = 25 * MEMORY_COST_UNIT_BYTES;

/// Default interval between expired-entry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Point-in-time cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_items: usize,
    pub memory_cost_bytes: usize,
    pub disk_items: usize,
    pub disk_bytes: u64,
}

/// Thread-safe two-tier cache shared by all request handlers.
pub struct ContentCache {
    memory: MemoryTier,
    disk: Arc<DiskTier>,
    ttl: Duration,
    events: broadcast::Sender<CacheEvent>,
}

impl ContentCache {
    /// Open the cache described by `config`, creating its directory if needed.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        let dir = config.resolved_dir();
        let ttl = config.ttl();
        let disk = DiskTier::open(&dir, config.disk_capacity_bytes, ttl)?;
        let memory = MemoryTier::new(config.memory_max_items, config.memory_max_cost_bytes);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            "Content cache ready at {:?} (disk {} bytes, memory {} items / {} bytes, ttl {:?})",
            dir,
            config.disk_capacity_bytes,
            config.memory_max_items,
            config.memory_max_cost_bytes,
            ttl
        );

        Ok(Self {
            memory,
            disk: Arc::new(disk),
            ttl,
            events,
        })
    }

    /// Subscribe to cache events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Look up a resource: memory first, then disk.
    ///
    /// A disk hit is promoted into memory with its remaining lifetime. Disk
    /// failures are logged and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedResource> {
        let now = now_ms();

        if let Some(resource) = self.memory.get(key, now) {
            tracing::trace!(key = %key, "Memory cache hit");
            self.emit(CacheEvent::Hit {
                key: key.clone(),
                tier: Tier::Memory,
            });
            return Some(resource);
        }

        let disk = Arc::clone(&self.disk);
        let lookup_key = key.clone();
        let lookup = tokio::task::spawn_blocking(move || disk.get(&lookup_key, now))
            .await
            .map_err(|e| Error::internal(format!("disk lookup task failed: {}", e)))
            .and_then(|result| result);

        match lookup {
            Ok(Some(hit)) => {
                tracing::trace!(key = %key, "Disk cache hit");
                self.emit(CacheEvent::Hit {
                    key: key.clone(),
                    tier: Tier::Disk,
                });
                self.promote(key, &hit);
                Some(hit.resource)
            }
            Ok(None) => {
                self.emit(CacheEvent::Miss { key: key.clone() });
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Disk cache read failed, treating as miss");
                self.emit(CacheEvent::ReadFailed {
                    key: key.clone(),
                    tier: Tier::Disk,
                    error: e.to_string(),
                });
                self.emit(CacheEvent::Miss { key: key.clone() });
                None
            }
        }
    }

    fn promote(&self, key: &CacheKey, hit: &DiskHit) {
        let evicted = self
            .memory
            .insert(key.clone(), hit.resource.clone(), hit.expires_at_ms);
        self.emit(CacheEvent::Promoted { key: key.clone() });
        self.emit_evictions(evicted, Tier::Memory);
    }

    /// Store a resource in both tiers under `key`.
    ///
    /// `key` must be the key of `resource.source_url()`. A disk write failure
    /// is logged and dropped; the memory copy is still served.
    pub async fn put(&self, key: &CacheKey, resource: CachedResource) {
        debug_assert_eq!(*key, resource.key(), "cache key does not match source URL");

        let expires_at_ms = now_ms().saturating_add(self.ttl.as_millis() as i64);
        let size = resource.cost();

        let evicted = self
            .memory
            .insert(key.clone(), resource.clone(), expires_at_ms);
        self.emit_evictions(evicted, Tier::Memory);

        let disk = Arc::clone(&self.disk);
        let write_key = key.clone();
        let write = tokio::task::spawn_blocking(move || {
            disk.put(&write_key, &resource, expires_at_ms)
        })
        .await
        .map_err(|e| Error::internal(format!("disk write task failed: {}", e)))
        .and_then(|result| result);

        match write {
            Ok(evicted) => {
                tracing::debug!(key = %key, bytes = size, "Stored resource");
                self.emit(CacheEvent::Stored {
                    key: key.clone(),
                    bytes: size,
                });
                self.emit_evictions(evicted, Tier::Disk);
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Disk cache write failed, dropping");
                self.emit(CacheEvent::WriteFailed {
                    key: key.clone(),
                    tier: Tier::Disk,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Empty both tiers.
    pub async fn clear(&self) -> Result<()> {
        self.memory.clear();

        let disk = Arc::clone(&self.disk);
        tokio::task::spawn_blocking(move || disk.clear())
            .await
            .map_err(|e| Error::internal(format!("disk clear task failed: {}", e)))??;

        tracing::info!("Content cache cleared");
        self.emit(CacheEvent::Cleared);
        Ok(())
    }

    /// Purge expired entries from both tiers. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = now_ms();
        let memory_expired = self.memory.purge_expired(now).len();

        let disk = Arc::clone(&self.disk);
        let disk_expired = match tokio::task::spawn_blocking(move || disk.purge_expired(now)).await
        {
            Ok(keys) => keys.len(),
            Err(e) => {
                tracing::warn!("Disk sweep task failed: {}", e);
                0
            }
        };

        if memory_expired > 0 {
            self.emit(CacheEvent::Expired {
                tier: Tier::Memory,
                count: memory_expired,
            });
        }
        if disk_expired > 0 {
            self.emit(CacheEvent::Expired {
                tier: Tier::Disk,
                count: disk_expired,
            });
        }
        if memory_expired + disk_expired > 0 {
            tracing::debug!(
                "Swept {} expired memory entries and {} expired disk entries",
                memory_expired,
                disk_expired
            );
        }
        memory_expired + disk_expired
    }

    /// Current occupancy of both tiers.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_items: self.memory.len(),
            memory_cost_bytes: self.memory.total_cost(),
            disk_items: self.disk.len(),
            disk_bytes: self.disk.total_bytes(),
        }
    }

    fn emit_evictions(&self, keys: Vec<CacheKey>, tier: Tier) {
        for key in keys {
            tracing::trace!(key = %key, tier = %tier, "Evicted cache entry");
            self.emit(CacheEvent::Evicted { key, tier });
        }
    }
}

/// Spawn a task that purges expired entries every `interval`.
pub fn start_sweep_task(
    cache: Arc<ContentCache>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let interval = if interval.is_zero() {
        DEFAULT_SWEEP_INTERVAL
    } else {
        interval
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            cache.sweep_expired().await;
        }
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
