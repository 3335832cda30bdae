//! Durable on-disk tier.
//!
//! Each entry is one file named by its [`CacheKey`], holding a bincode
//! [`DiskRecord`]. Writes go to a uniquely named `.tmp` file first and are
//! renamed into place while the index lock is held, so a reader sees either
//! the old entry, the new one, or nothing.
//!
//! An in-memory index tracks sizes, expiry, and recency so eviction does not
//! have to walk the directory. It is rebuilt from the directory on open.
//! Files are only renamed into place or deleted under the index lock, so the
//! index and the directory agree whenever the lock is free.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use bytes::Bytes;
use hlsproxy_common::{CacheKey, Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::CachedResource;

const TEMP_SUFFIX: &str = ".tmp";

/// On-disk layout of an entry. `B` is borrowed when writing and owned when
/// reading; both serialize identically.
#[derive(Serialize, Deserialize)]
struct DiskRecord<B> {
    source_url: String,
    mime_type: String,
    expires_at_ms: i64,
    bytes: B,
}

struct IndexEntry {
    size: u64,
    expires_at_ms: i64,
    last_accessed: u64,
}

#[derive(Default)]
struct DiskIndex {
    entries: HashMap<CacheKey, IndexEntry>,
    total_bytes: u64,
    clock: u64,
}

impl DiskIndex {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, key: CacheKey, size: u64, expires_at_ms: i64) {
        let last_accessed = self.tick();
        if let Some(old) = self.entries.insert(
            key,
            IndexEntry {
                size,
                expires_at_ms,
                last_accessed,
            },
        ) {
            self.total_bytes -= old.size;
        }
        self.total_bytes += size;
    }

    fn remove(&mut self, key: &CacheKey) -> Option<IndexEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size;
        Some(entry)
    }

    fn oldest_except(&self, keep: Option<&CacheKey>) -> Option<CacheKey> {
        self.entries
            .iter()
            .filter(|(key, _)| Some(*key) != keep)
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
    }
}

/// A disk entry together with its absolute expiry.
pub struct DiskHit {
    pub resource: CachedResource,
    pub expires_at_ms: i64,
}

/// Thread-safe disk tier bounded by total size, with per-entry TTL.
pub struct DiskTier {
    dir: PathBuf,
    capacity_bytes: u64,
    ttl: Duration,
    index: Mutex<DiskIndex>,
}

impl DiskTier {
    /// Open (creating if needed) a disk tier rooted at `dir`.
    ///
    /// Leftover temp files are deleted and the index is rebuilt from the
    /// remaining entries, oldest modification first. Expiry for existing
    /// entries is estimated from their modification time; the record's own
    /// expiry is still checked on read.
    pub fn open(dir: impl Into<PathBuf>, capacity_bytes: u64, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut found = Vec::new();
        for dir_entry in fs::read_dir(&dir)? {
            let dir_entry = dir_entry?;
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if name.ends_with(TEMP_SUFFIX) {
                if let Err(e) = fs::remove_file(dir_entry.path()) {
                    tracing::warn!("Failed to remove stale temp file {:?}: {}", dir_entry.path(), e);
                }
                continue;
            }

            let Some(key) = CacheKey::from_hex(name) else {
                continue;
            };
            let metadata = dir_entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            found.push((key, metadata.len(), modified_ms));
        }

        found.sort_by_key(|(_, _, modified_ms)| *modified_ms);

        let mut index = DiskIndex::default();
        let ttl_ms = ttl.as_millis() as i64;
        for (key, size, modified_ms) in found {
            index.insert(key, size, modified_ms.saturating_add(ttl_ms));
        }

        tracing::debug!(
            "Opened disk cache at {:?} with {} entries ({} bytes)",
            dir,
            index.entries.len(),
            index.total_bytes
        );

        let tier = Self {
            dir,
            capacity_bytes,
            ttl,
            index: Mutex::new(index),
        };
        tier.enforce_capacity(None);
        Ok(tier)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Read an entry.
    ///
    /// `Ok(None)` for unknown or expired keys. A file that cannot be decoded,
    /// or whose source URL does not hash to `key`, is deleted and reported as
    /// an error so the caller can log it and treat it as a miss.
    pub fn get(&self, key: &CacheKey, now_ms: i64) -> Result<Option<DiskHit>> {
        {
            let mut index = self.index.lock();
            let expired = match index.entries.get(key) {
                None => return Ok(None),
                Some(entry) => entry.expires_at_ms <= now_ms,
            };
            if expired {
                index.remove(key);
                self.remove_file(key);
                return Ok(None);
            }
        }

        let data = match fs::read(self.entry_path(key)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let mut index = self.index.lock();
                if !self.entry_path(key).exists() {
                    index.remove(key);
                }
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record: DiskRecord<Vec<u8>> = match bincode::deserialize(&data) {
            Ok(record) => record,
            Err(e) => {
                self.discard(key);
                return Err(Error::cache(format!("corrupt entry {}: {}", key, e)));
            }
        };

        if record.expires_at_ms <= now_ms {
            self.discard(key);
            return Ok(None);
        }

        let source_url = match Url::parse(&record.source_url) {
            Ok(url) if CacheKey::for_url(&url) == *key => url,
            _ => {
                self.discard(key);
                return Err(Error::cache(format!(
                    "entry {} does not belong to {}",
                    key, record.source_url
                )));
            }
        };

        {
            let mut index = self.index.lock();
            let tick = index.tick();
            if let Some(entry) = index.entries.get_mut(key) {
                entry.last_accessed = tick;
                entry.expires_at_ms = record.expires_at_ms;
            }
        }

        Ok(Some(DiskHit {
            resource: CachedResource::new(Bytes::from(record.bytes), source_url, record.mime_type),
            expires_at_ms: record.expires_at_ms,
        }))
    }

    /// Write an entry, returning the keys evicted to stay under capacity.
    ///
    /// An entry larger than the whole tier is not written.
    pub fn put(
        &self,
        key: &CacheKey,
        resource: &CachedResource,
        expires_at_ms: i64,
    ) -> Result<Vec<CacheKey>> {
        let record = DiskRecord {
            source_url: resource.source_url().as_str().to_string(),
            mime_type: resource.mime_type().to_string(),
            expires_at_ms,
            bytes: resource.bytes().as_ref(),
        };
        let encoded = bincode::serialize(&record)
            .map_err(|e| Error::cache(format!("failed to encode entry {}: {}", key, e)))?;
        let size = encoded.len() as u64;

        if size > self.capacity_bytes {
            tracing::debug!(
                "Not writing {} to disk cache: {} bytes exceeds capacity {}",
                key,
                size,
                self.capacity_bytes
            );
            return Ok(Vec::new());
        }

        let temp_path = self
            .dir
            .join(format!("{}.{}{}", key, uuid::Uuid::new_v4(), TEMP_SUFFIX));
        if let Err(e) = write_file(&temp_path, &encoded) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        {
            let mut index = self.index.lock();
            if let Err(e) = fs::rename(&temp_path, self.entry_path(key)) {
                drop(index);
                let _ = fs::remove_file(&temp_path);
                return Err(e.into());
            }
            index.insert(key.clone(), size, expires_at_ms);
        }

        Ok(self.enforce_capacity(Some(key)))
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut index = self.index.lock();
        let removed = index.remove(key).is_some();
        if removed {
            self.remove_file(key);
        }
        removed
    }

    /// Delete every entry. In-flight writes either land before the clear
    /// and are removed, or land after it as a complete entry.
    pub fn clear(&self) -> Result<()> {
        let mut index = self.index.lock();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let is_entry = dir_entry
                .file_name()
                .to_str()
                .is_some_and(|name| CacheKey::from_hex(name).is_some());
            if is_entry {
                match fs::remove_file(dir_entry.path()) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        *index = DiskIndex::default();
        Ok(())
    }

    /// Delete every entry whose indexed expiry is before `now_ms`.
    pub fn purge_expired(&self, now_ms: i64) -> Vec<CacheKey> {
        let mut index = self.index.lock();
        let expired: Vec<CacheKey> = index
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at_ms <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            index.remove(key);
            self.remove_file(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> u64 {
        self.index.lock().total_bytes
    }

    fn enforce_capacity(&self, keep: Option<&CacheKey>) -> Vec<CacheKey> {
        let mut evicted = Vec::new();
        let mut index = self.index.lock();
        while index.total_bytes > self.capacity_bytes {
            let Some(oldest) = index.oldest_except(keep) else {
                break;
            };
            index.remove(&oldest);
            self.remove_file(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    /// Drop an unreadable entry from both the index and the directory.
    fn discard(&self, key: &CacheKey) {
        let mut index = self.index.lock();
        index.remove(key);
        self.remove_file(key);
    }

    /// Callers hold the index lock, so a concurrent `put` cannot rename a
    /// fresh entry into place between the index update and the delete.
    fn remove_file(&self, key: &CacheKey) {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove cache file for {}: {}", key, e),
        }
    }
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}
