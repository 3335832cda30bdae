//! Per-key fetch coalescing.
//!
//! Concurrent misses for one key take turns through a per-key async gate. The
//! first holder fetches and stores; later holders re-check the cache once the
//! gate opens and usually find the resource already there.

use std::sync::Arc;

use dashmap::DashMap;
use hlsproxy_common::CacheKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct InflightFetches {
    gates: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl InflightFetches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`.
    pub async fn acquire(self: &Arc<Self>, key: &CacheKey) -> InflightGuard {
        let gate = self
            .gates
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = gate.lock_owned().await;
        InflightGuard {
            owner: Arc::clone(self),
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a fetch in progress or waiting.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

/// Held while fetching one key; releases the gate on drop.
pub struct InflightGuard {
    owner: Arc<InflightFetches>,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        // Unlock first so the map entry is the last strong reference when
        // nobody else is waiting.
        self.guard.take();
        self.owner
            .gates
            .remove_if(&self.key, |_, gate| Arc::strong_count(gate) == 1);
    }
}
