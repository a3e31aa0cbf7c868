//! Versioned application cache
//!
//! The whole application map is one value in a [`CacheStore`], wrapped in an
//! envelope that records the schema version, the check-key generation read
//! when the fill started, the fill time and the pages the value depends on.
//!
//! A value is served only while all three of version, generation and age
//! match. Invalidation never deletes anything; it bumps the generation, so
//! every process sharing the store stops trusting the value at once.
//!
//! Concurrent misses are serialised by an advisory lock (`add` with a TTL).
//! The caller that takes it fills; the others serve the previous value if
//! one exists, or poll for the new one for a bounded time and then fill
//! themselves.

use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::model::Applications;
use crate::store::CacheStore;
use rawcss_page::PageTitle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Version of the cached value layout
pub const SCHEMA_VERSION: u32 = 2;

const DEFAULT_KEY: &str = "rawcss:applications";

/// Stored form of the application map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Schema version plus the configured bump
    pub version: u32,
    /// Check-key generation at fill start
    pub generation: u64,
    /// Fill time, milliseconds since the Unix epoch
    pub created_at_ms: u64,
    /// The cached applications
    pub applications: Applications,
    /// Pages whose change invalidates this value
    pub dependencies: BTreeSet<PageTitle>,
}

/// Result of computing the application map
#[derive(Debug, Clone, Default)]
pub struct Fill {
    /// Applications to return
    pub applications: Applications,
    /// Pages the result was computed from
    pub dependencies: BTreeSet<PageTitle>,
    /// Whether the result may be stored
    pub cacheable: bool,
}

impl Fill {
    /// Result to store with its dependencies
    #[must_use]
    pub fn cacheable(applications: Applications, dependencies: BTreeSet<PageTitle>) -> Self {
        Self {
            applications,
            dependencies,
            cacheable: true,
        }
    }

    /// Result to return without storing
    #[must_use]
    pub fn uncacheable(applications: Applications) -> Self {
        Self {
            applications,
            dependencies: BTreeSet::new(),
            cacheable: false,
        }
    }
}

/// How a lookup was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Fresh stored value
    Hit,
    /// This caller held the lock and filled
    Filled,
    /// Another caller is filling; the previous value was served
    Stale,
    /// Another caller's fill arrived while waiting
    Waited,
    /// Waiting timed out; this caller filled without the lock
    Computed,
}

/// Applications plus how they were obtained
#[derive(Debug, Clone)]
pub struct Lookup {
    /// The application map
    pub applications: Applications,
    /// Where it came from
    pub outcome: CacheOutcome,
}

/// Read-through cache of the application map
#[derive(Debug, Clone)]
pub struct ApplicationCache<K> {
    store: K,
    key: String,
    check_key: String,
    lock_key: String,
    settings: CacheSettings,
}

impl<K: CacheStore> ApplicationCache<K> {
    /// Cache under the default key
    #[must_use]
    pub fn new(store: K, settings: CacheSettings) -> Self {
        Self::with_key(store, settings, DEFAULT_KEY)
    }

    /// Cache under `key`, for stores shared by several wikis
    #[must_use]
    pub fn with_key(store: K, settings: CacheSettings, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            store,
            check_key: format!("{key}:check"),
            lock_key: format!("{key}:lock"),
            key,
            settings,
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &K {
        &self.store
    }

    /// Cache settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Version a value must carry to be served
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        SCHEMA_VERSION.saturating_add(self.settings.version_bump)
    }

    /// Current generation of the check key
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.store.generation(&self.check_key)
    }

    /// Applications, filling with `fill` when the stored value is not fresh
    pub fn applications<F>(&self, fill: F) -> Applications
    where
        F: FnOnce() -> Fill,
    {
        self.lookup(fill).applications
    }

    /// Like [`applications`](Self::applications), reporting how the value was obtained
    pub fn lookup<F>(&self, fill: F) -> Lookup
    where
        F: FnOnce() -> Fill,
    {
        let generation = self.generation();
        let cached = self.read();
        if let Some(envelope) = &cached {
            if self.is_fresh(envelope, generation) {
                return Lookup {
                    applications: envelope.applications.clone(),
                    outcome: CacheOutcome::Hit,
                };
            }
        }

        if let Some(_lock) = LockGuard::acquire(&self.store, &self.lock_key, &self.settings) {
            // Another fill may have finished between the read and the lock
            if let Some(envelope) = self.read().filter(|e| self.is_fresh(e, generation)) {
                return Lookup {
                    applications: envelope.applications,
                    outcome: CacheOutcome::Hit,
                };
            }
            let applications = self.fill_and_store(generation, fill);
            return Lookup {
                applications,
                outcome: CacheOutcome::Filled,
            };
        }

        if let Some(envelope) = cached.filter(|e| e.version == self.version()) {
            debug!(generation = envelope.generation, "serving previous applications during fill");
            return Lookup {
                applications: envelope.applications,
                outcome: CacheOutcome::Stale,
            };
        }

        let deadline = Instant::now() + self.settings.lock_wait();
        while Instant::now() < deadline {
            thread::sleep(self.settings.poll_interval());
            let generation = self.generation();
            if let Some(envelope) = self.read().filter(|e| self.is_fresh(e, generation)) {
                return Lookup {
                    applications: envelope.applications,
                    outcome: CacheOutcome::Waited,
                };
            }
            if self.store.get(&self.lock_key).is_none() {
                break;
            }
        }

        debug!("no fill arrived in time, computing applications");
        let applications = self.fill_and_store(self.generation(), fill);
        Lookup {
            applications,
            outcome: CacheOutcome::Computed,
        }
    }

    /// Make every process stop serving the stored value
    pub fn invalidate(&self) {
        let generation = self.store.bump_generation(&self.check_key);
        info!(generation, "application cache invalidated");
    }

    /// Whether the stored value was computed from `title`
    #[must_use]
    pub fn depends_on(&self, title: &PageTitle) -> bool {
        self.read()
            .is_some_and(|envelope| envelope.dependencies.contains(title))
    }

    /// Stored envelope, if any and readable
    #[must_use]
    pub fn read(&self) -> Option<Envelope> {
        match self.decode() {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable application cache value");
                None
            }
        }
    }

    fn decode(&self) -> Result<Option<Envelope>, CacheError> {
        let Some(raw) = self.store.get(&self.key) else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: self.key.clone(),
                source,
            })
    }

    fn is_fresh(&self, envelope: &Envelope, generation: u64) -> bool {
        let age = now_ms().saturating_sub(envelope.created_at_ms);
        envelope.version == self.version()
            && envelope.generation == generation
            && u128::from(age) < self.settings.ttl().as_millis()
    }

    fn fill_and_store<F>(&self, generation: u64, fill: F) -> Applications
    where
        F: FnOnce() -> Fill,
    {
        let started = Instant::now();
        let Fill {
            applications,
            dependencies,
            cacheable,
        } = fill();
        let elapsed_ms = started.elapsed().as_millis();

        if !cacheable {
            debug!(elapsed_ms, "application fill not cacheable");
            return applications;
        }
        if self.generation() != generation {
            debug!(generation, "invalidated during fill, not storing");
            return applications;
        }

        let envelope = Envelope {
            version: self.version(),
            generation,
            created_at_ms: now_ms(),
            applications,
            dependencies,
        };
        match serde_json::to_string(&envelope).map_err(CacheError::Encode) {
            Ok(raw) => {
                self.store.set(&self.key, raw, self.settings.ttl() * 2);
                info!(
                    applications = envelope.applications.len(),
                    dependencies = envelope.dependencies.len(),
                    generation,
                    elapsed_ms,
                    "application cache filled"
                );
            }
            Err(err) => warn!(error = %err, "application cache value not stored"),
        }
        envelope.applications
    }
}

static LOCK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Advisory fill lock, released on drop
///
/// The stored value identifies one acquisition, so a holder whose lock
/// expired cannot release a lock taken since.
struct LockGuard<'a, K: CacheStore> {
    store: &'a K,
    key: &'a str,
    token: String,
}

impl<'a, K: CacheStore> LockGuard<'a, K> {
    fn acquire(store: &'a K, key: &'a str, settings: &CacheSettings) -> Option<Self> {
        let token = format!(
            "{}:{}:{}",
            std::process::id(),
            LOCK_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            now_ms()
        );
        if store.add(key, token.clone(), settings.lock_ttl()) {
            Some(Self { store, key, token })
        } else {
            debug!(lock = key, "application cache fill already in progress");
            None
        }
    }
}

impl<K: CacheStore> Drop for LockGuard<'_, K> {
    fn drop(&mut self) {
        if self.store.get(self.key).as_deref() == Some(self.token.as_str()) {
            self.store.delete(self.key);
        } else {
            debug!(lock = self.key, "fill lock expired before release");
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApplicationBundle, ApplicationId};
    use crate::store::MemoryCacheStore;
    use rawcss_page::Namespace;
    use std::cell::Cell;
    use std::time::Duration;

    fn applications(marker: &str) -> Applications {
        let mut map = Applications::new();
        map.insert(
            ApplicationId::Wildcard,
            ApplicationBundle {
                id: ApplicationId::Wildcard,
                entries: Vec::new(),
                preload: vec![crate::model::PreloadDirective::new(format!("https://x/{marker}"), "image")],
            },
        );
        map
    }

    fn marker(applications: &Applications) -> String {
        applications[&ApplicationId::Wildcard].preload[0].href.clone()
    }

    fn title(text: &str) -> PageTitle {
        PageTitle::new(Namespace::RAWCSS, text).unwrap()
    }

    fn cache() -> ApplicationCache<MemoryCacheStore> {
        ApplicationCache::new(MemoryCacheStore::new(), CacheSettings::default())
    }

    #[test]
    fn fills_once_then_hits() {
        let cache = cache();
        let fills = Cell::new(0);
        let fill = || {
            fills.set(fills.get() + 1);
            Fill::cacheable(applications("a"), BTreeSet::new())
        };
        assert_eq!(cache.lookup(fill).outcome, CacheOutcome::Filled);
        assert_eq!(cache.lookup(fill).outcome, CacheOutcome::Hit);
        assert_eq!(fills.get(), 1);
        assert!(cache.store().get("rawcss:applications:lock").is_none());
    }

    #[test]
    fn invalidation_forces_a_refill() {
        let cache = cache();
        cache.applications(|| Fill::cacheable(applications("a"), BTreeSet::new()));
        cache.invalidate();
        let lookup = cache.lookup(|| Fill::cacheable(applications("b"), BTreeSet::new()));
        assert_eq!(lookup.outcome, CacheOutcome::Filled);
        assert_eq!(marker(&lookup.applications), "https://x/b");
        assert_eq!(cache.read().unwrap().generation, 1);
    }

    #[test]
    fn uncacheable_fills_are_not_stored() {
        let cache = cache();
        cache.applications(|| Fill::uncacheable(Applications::new()));
        assert!(cache.read().is_none());
    }

    #[test]
    fn fill_invalidated_midway_is_returned_but_not_stored() {
        let cache = cache();
        let applications = cache.applications(|| {
            cache.invalidate();
            Fill::cacheable(applications("racy"), BTreeSet::new())
        });
        assert_eq!(marker(&applications), "https://x/racy");
        assert!(cache.read().is_none());
    }

    #[test]
    fn version_bump_discards_old_values() {
        let store = MemoryCacheStore::new();
        let old = ApplicationCache::new(store.clone(), CacheSettings::default());
        old.applications(|| Fill::cacheable(applications("old"), BTreeSet::new()));

        let bumped = ApplicationCache::new(store, CacheSettings::default().with_version_bump(1));
        assert_eq!(bumped.version(), SCHEMA_VERSION + 1);
        let lookup = bumped.lookup(|| Fill::cacheable(applications("new"), BTreeSet::new()));
        assert_eq!(lookup.outcome, CacheOutcome::Filled);
    }

    #[test]
    fn zero_ttl_never_hits() {
        let cache = ApplicationCache::new(MemoryCacheStore::new(), CacheSettings::default().with_ttl_secs(0));
        cache.applications(|| Fill::cacheable(applications("a"), BTreeSet::new()));
        let lookup = cache.lookup(|| Fill::cacheable(applications("b"), BTreeSet::new()));
        assert_eq!(lookup.outcome, CacheOutcome::Filled);
    }

    #[test]
    fn expired_lock_does_not_release_a_newer_holder() {
        let store = MemoryCacheStore::new();
        let settings = CacheSettings::default();
        let key = "rawcss:applications:lock";

        let first = LockGuard::acquire(&store, key, &settings).unwrap();
        assert!(LockGuard::acquire(&store, key, &settings).is_none());

        // The first lock lapses and another caller takes it
        store.delete(key);
        let second = LockGuard::acquire(&store, key, &settings).unwrap();
        assert_ne!(first.token, second.token);

        drop(first);
        assert_eq!(store.get(key).as_deref(), Some(second.token.as_str()));
        drop(second);
        assert!(store.get(key).is_none());
    }

    #[test]
    fn lock_holder_elsewhere_means_stale_value() {
        let cache = cache();
        cache.applications(|| Fill::cacheable(applications("a"), BTreeSet::new()));
        cache.invalidate();
        assert!(cache.store().add("rawcss:applications:lock", "other".into(), Duration::from_secs(10)));

        let lookup = cache.lookup(|| Fill::cacheable(applications("b"), BTreeSet::new()));
        assert_eq!(lookup.outcome, CacheOutcome::Stale);
        assert_eq!(marker(&lookup.applications), "https://x/a");
    }

    #[test]
    fn lock_holder_elsewhere_without_value_times_out_and_computes() {
        let settings = CacheSettings::default().with_lock_wait_ms(30).with_poll_interval_ms(5);
        let cache = ApplicationCache::new(MemoryCacheStore::new(), settings);
        assert!(cache.store().add("rawcss:applications:lock", "other".into(), Duration::from_secs(10)));

        let lookup = cache.lookup(|| Fill::cacheable(applications("mine"), BTreeSet::new()));
        assert_eq!(lookup.outcome, CacheOutcome::Computed);
        assert_eq!(marker(&cache.read().unwrap().applications), "https://x/mine");
    }

    #[test]
    fn dependencies_are_recorded() {
        let cache = cache();
        let dependencies: BTreeSet<_> = [title("A.css")].into_iter().collect();
        cache.applications(|| Fill::cacheable(applications("a"), dependencies));
        assert!(cache.depends_on(&title("A.css")));
        assert!(!cache.depends_on(&title("B.css")));
    }

    #[test]
    fn corrupt_values_are_treated_as_misses() {
        let cache = cache();
        cache
            .store()
            .set("rawcss:applications", "not json".into(), Duration::from_secs(60));
        assert!(cache.read().is_none());
        let lookup = cache.lookup(|| Fill::cacheable(applications("a"), BTreeSet::new()));
        assert_eq!(lookup.outcome, CacheOutcome::Filled);
    }

    #[test]
    fn keys_are_configurable() {
        let store = MemoryCacheStore::new();
        let one = ApplicationCache::with_key(store.clone(), CacheSettings::default(), "wiki-a");
        let two = ApplicationCache::with_key(store, CacheSettings::default(), "wiki-b");
        one.applications(|| Fill::cacheable(applications("a"), BTreeSet::new()));
        one.invalidate();
        assert_eq!(two.generation(), 0);
        assert!(two.read().is_none());
    }
}
