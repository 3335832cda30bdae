//! Bounded in-memory tier.
//!
//! Holds at most `max_items` entries whose combined cost (body bytes) stays
//! under `max_cost`. The least recently used entry goes first on overflow.

use std::collections::HashMap;

use hlsproxy_common::CacheKey;
use parking_lot::Mutex;

use super::CachedResource;

struct MemoryEntry {
    resource: CachedResource,
    expires_at_ms: i64,
    last_accessed: u64,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<CacheKey, MemoryEntry>,
    total_cost: usize,
    clock: u64,
}

impl MemoryState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &CacheKey) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        self.total_cost -= entry.resource.cost();
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())?;
        self.remove(&oldest);
        Some(oldest)
    }
}

/// Thread-safe LRU tier bounded by item count and total cost.
pub struct MemoryTier {
    state: Mutex<MemoryState>,
    max_items: usize,
    max_cost: usize,
}

impl MemoryTier {
    pub fn new(max_items: usize, max_cost: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            max_items,
            max_cost,
        }
    }

    /// Look up an entry, dropping it if it expired before `now_ms`.
    pub fn get(&self, key: &CacheKey, now_ms: i64) -> Option<CachedResource> {
        let mut state = self.state.lock();
        let tick = state.tick();

        let expired = match state.entries.get_mut(key) {
            Some(entry) if entry.expires_at_ms > now_ms => {
                entry.last_accessed = tick;
                return Some(entry.resource.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(key);
            tracing::trace!(key = %key, "Dropped expired memory entry");
        }
        None
    }

    /// Insert or replace an entry, returning the keys evicted to make room.
    ///
    /// A resource costing more than the whole tier is not admitted; any older
    /// entry under the same key is still dropped so the tier never serves a
    /// stale version of it.
    pub fn insert(
        &self,
        key: CacheKey,
        resource: CachedResource,
        expires_at_ms: i64,
    ) -> Vec<CacheKey> {
        let mut state = self.state.lock();
        state.remove(&key);

        let cost = resource.cost();
        if cost > self.max_cost || self.max_items == 0 {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while state.entries.len() >= self.max_items || state.total_cost + cost > self.max_cost {
            match state.evict_oldest() {
                Some(old) => evicted.push(old),
                None => break,
            }
        }

        let tick = state.tick();
        state.total_cost += cost;
        state.entries.insert(
            key,
            MemoryEntry {
                resource,
                expires_at_ms,
                last_accessed: tick,
            },
        );
        evicted
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.state.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_cost = 0;
    }

    /// Drop every entry that expired before `now_ms`.
    pub fn purge_expired(&self, now_ms: i64) -> Vec<CacheKey> {
        let mut state = self.state.lock();
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at_ms <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_cost(&self) -> usize {
        self.state.lock().total_cost
    }
}
