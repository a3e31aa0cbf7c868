//! Shared cache store
//!
//! [`CacheStore`] is the only state the application cache relies on, so
//! every process that shares a store sees the same values, locks and
//! generations. Values are opaque strings replaced whole.
//!
//! [`MemoryCacheStore`] is the in-process implementation, backed by
//! [`moka::sync::Cache`] with a per-entry expiry.

use dashmap::DashMap;
use moka::sync::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key-value store shared by every process serving applications
pub trait CacheStore: Send + Sync {
    /// Current value, `None` when absent or expired
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` for `ttl`, replacing any previous value
    fn set(&self, key: &str, value: String, ttl: Duration);

    /// Store `value` only if `key` is absent; `true` if this call stored it
    fn add(&self, key: &str, value: String, ttl: Duration) -> bool;

    /// Remove `key`
    fn delete(&self, key: &str);

    /// Current generation of a check key, `0` if never bumped
    fn generation(&self, key: &str) -> u64;

    /// Advance the generation of a check key and return the new one
    fn bump_generation(&self, key: &str) -> u64;
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        (**self).set(key, value, ttl);
    }

    fn add(&self, key: &str, value: String, ttl: Duration) -> bool {
        (**self).add(key, value, ttl)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key);
    }

    fn generation(&self, key: &str) -> u64 {
        (**self).generation(key)
    }

    fn bump_generation(&self, key: &str) -> u64 {
        (**self).bump_generation(key)
    }
}

#[derive(Debug, Clone)]
struct Stored {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with
struct PerEntryTtl;

impl Expiry<String, Stored> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Stored, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`CacheStore`]
///
/// Cloning shares the underlying store.
#[derive(Clone)]
pub struct MemoryCacheStore {
    values: Cache<String, Stored>,
    generations: Arc<DashMap<String, u64>>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("entry_count", &self.values.entry_count())
            .field("check_keys", &self.generations.len())
            .finish()
    }
}

impl MemoryCacheStore {
    /// Default maximum number of values
    pub const DEFAULT_CAPACITY: u64 = 1024;

    /// Create store with the default capacity
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create store holding at most `max_capacity` values
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            values: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
            generations: Arc::new(DashMap::new()),
        }
    }

    /// Approximate number of live values
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.values.run_pending_tasks();
        self.values.entry_count()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|stored| stored.value)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        self.values.insert(key.to_string(), Stored { value, ttl });
    }

    fn add(&self, key: &str, value: String, ttl: Duration) -> bool {
        self.values
            .entry(key.to_string())
            .or_insert_with(|| Stored { value, ttl })
            .is_fresh()
    }

    fn delete(&self, key: &str) {
        self.values.invalidate(key);
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }

    fn bump_generation(&self, key: &str) -> u64 {
        let mut generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }
}
