//! Caching principal attributes repository.
//!
//! Resolved attributes are cached per principal for a configured
//! time-to-live. Each principal has its own slot guarded by a mutex, and the
//! upstream fetch happens while that mutex is held: concurrent resolutions
//! of one principal wait for the in-flight fetch and then read its result,
//! while different principals never contend.
//!
//! Slots are dropped when an upstream fetch fails, and expired slots are
//! swept once the cache grows past a threshold that doubles with the live
//! population.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use warden_core::error::Result;
use warden_core::types::{Attributes, Principal};

use super::merge::MergeStrategy;
use super::source::{AttributeSourceDefinition, AttributeSources};

/// Unit of a cache expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    /// Milliseconds
    Milliseconds,
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    Hours,
}

impl TimeUnit {
    /// The duration of `amount` units.
    pub fn duration(&self, amount: u64) -> Duration {
        match self {
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3600)),
        }
    }
}

/// A repository that caches upstream attributes per principal.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingAttributeRepository {
    /// Where attributes are fetched from on a cache miss.
    pub source: AttributeSourceDefinition,

    /// Unit of `expiration`.
    pub time_unit: TimeUnit,

    /// How long a resolved mapping stays valid.
    pub expiration: u64,

    /// How fresh attributes combine with those the principal carries.
    #[serde(default)]
    pub merge_strategy: MergeStrategy,

    #[serde(skip)]
    cache: Arc<AttributeCache>,
}

impl CachingAttributeRepository {
    /// Create a repository with the default merge strategy.
    pub fn new(source: impl Into<AttributeSourceDefinition>, time_unit: TimeUnit, expiration: u64) -> Self {
        Self {
            source: source.into(),
            time_unit,
            expiration,
            merge_strategy: MergeStrategy::default(),
            cache: Arc::default(),
        }
    }

    /// Use a different merge strategy.
    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> Self {
        self.merge_strategy = merge_strategy;
        self
    }

    /// The configured time-to-live.
    pub fn time_to_live(&self) -> Duration {
        self.time_unit.duration(self.expiration)
    }

    /// When an entry cached now expires; `None` if the time-to-live is
    /// beyond what the clock can represent.
    fn expires_at(&self) -> Option<Instant> {
        Instant::now().checked_add(self.time_to_live())
    }

    /// Resolve the attributes of `principal`.
    ///
    /// A live cache entry is returned as is. Otherwise the upstream source is
    /// queried, its result merged onto the attributes the principal already
    /// carries, and the merged mapping cached. Upstream failures propagate
    /// and drop the principal's slot.
    pub fn attributes(&self, principal: &Principal, sources: &AttributeSources) -> Result<Attributes> {
        let slot = self.cache.slot(&principal.id);
        let mut entry = slot.lock();

        if let Some(cached) = entry.as_ref().filter(|e| !e.is_expired()) {
            debug!(principal = %principal.id, "attribute cache hit");
            return Ok(cached.attributes.clone());
        }

        debug!(principal = %principal.id, "attribute cache miss, fetching upstream");
        let fresh = match self.source.fetch(&principal.id, sources) {
            Ok(fresh) => fresh,
            Err(e) => {
                self.cache.release(&principal.id, &slot);
                return Err(e.into());
            }
        };
        let merged = self.merge_strategy.merge(&principal.attributes, fresh);

        *entry = Some(CacheEntry {
            attributes: merged.clone(),
            expires_at: self.expires_at(),
        });
        drop(entry);

        self.cache.maybe_sweep();
        Ok(merged)
    }

    /// Resolve by principal id alone.
    pub fn resolve(&self, principal_id: &str, sources: &AttributeSources) -> Result<Attributes> {
        self.attributes(&Principal::new(principal_id), sources)
    }

    /// Drop the cached entry of one principal.
    pub fn invalidate(&self, principal_id: &str) {
        self.cache.entries.remove(principal_id);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.cache.entries.clear();
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        self.cache.sweep();
    }

    /// Number of principals holding a cache slot.
    pub fn cached_principals(&self) -> usize {
        self.cache.entries.len()
    }
}

// The cache is runtime state; equality covers configuration only.
impl PartialEq for CachingAttributeRepository {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.time_unit == other.time_unit
            && self.expiration == other.expiration
            && self.merge_strategy == other.merge_strategy
    }
}

impl Eq for CachingAttributeRepository {}

impl fmt::Debug for CachingAttributeRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingAttributeRepository")
            .field("source", &self.source)
            .field("time_unit", &self.time_unit)
            .field("expiration", &self.expiration)
            .field("merge_strategy", &self.merge_strategy)
            .field("cached_principals", &self.cache.entries.len())
            .finish()
    }
}

/// Cache size at which expired slots are first swept.
const SWEEP_THRESHOLD: usize = 1024;

struct AttributeCache {
    entries: DashMap<String, Arc<Mutex<Option<CacheEntry>>>>,
    next_sweep: AtomicUsize,
}

impl Default for AttributeCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            next_sweep: AtomicUsize::new(SWEEP_THRESHOLD),
        }
    }
}

impl AttributeCache {
    fn slot(&self, principal_id: &str) -> Arc<Mutex<Option<CacheEntry>>> {
        if let Some(slot) = self.entries.get(principal_id) {
            return Arc::clone(slot.value());
        }
        let slot = self.entries.entry(principal_id.to_string()).or_default();
        Arc::clone(slot.value())
    }

    /// Remove the slot of `principal_id` if it is still `slot`.
    ///
    /// Called with the slot's mutex held, so the predicate must not lock it.
    fn release(&self, principal_id: &str, slot: &Arc<Mutex<Option<CacheEntry>>>) {
        self.entries
            .remove_if(principal_id, |_, current| Arc::ptr_eq(current, slot));
    }

    fn maybe_sweep(&self) {
        if self.entries.len() < self.next_sweep.load(Ordering::Relaxed) {
            return;
        }
        self.sweep();
        let live = self.entries.len();
        self.next_sweep
            .store(SWEEP_THRESHOLD.max(live.saturating_mul(2)), Ordering::Relaxed);
    }

    /// Drop empty and expired slots. Slots locked by an in-flight fetch stay.
    fn sweep(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, slot| match slot.try_lock() {
            Some(entry) => entry.as_ref().is_some_and(|e| !e.is_expired()),
            None => true,
        });
        debug!(
            before,
            after = self.entries.len(),
            "swept expired attribute cache entries"
        );
    }
}

struct CacheEntry {
    attributes: Attributes,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}
