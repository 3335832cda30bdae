use hlsproxy_common::CacheKey;
use serde::Serialize;

/// Which cache tier an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Disk,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Disk => f.write_str("disk"),
        }
    }
}

/// Observable cache activity.
///
/// Tier failures never reach the proxy's clients; they surface here and in
/// the log instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A lookup was answered by a tier.
    Hit { key: CacheKey, tier: Tier },
    /// Neither tier had the key.
    Miss { key: CacheKey },
    /// A disk hit was copied into memory.
    Promoted { key: CacheKey },
    /// A resource was written.
    Stored { key: CacheKey, bytes: usize },
    /// An entry was dropped to respect a tier bound.
    Evicted { key: CacheKey, tier: Tier },
    /// Expired entries were purged by a sweep.
    Expired { tier: Tier, count: usize },
    /// A read failed and was treated as a miss.
    ReadFailed { key: CacheKey, tier: Tier, error: String },
    /// A write failed and was dropped.
    WriteFailed { key: CacheKey, tier: Tier, error: String },
    /// Both tiers were emptied.
    Cleared,
}
