// ABOUTME: Volatile in-memory cache of structured results keyed by request path.
// ABOUTME: Unbounded by default; optional capacity (LRU eviction) and TTL policies.

//! Volatile result cache.
//!
//! Entries are stored as `Arc<StructuredResult>` behind a `RwLock`, so a
//! reader either sees the whole previous entry or the whole new one. Lookups
//! take the shared lock and bump an atomic access tick used for LRU eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::extractors::StructuredResult;

/// Storage contract for the volatile tier.
///
/// `set` failures are reported but never abort a resolution.
pub trait ResultCache: Send + Sync {
    fn get(&self, path: &str) -> Option<Arc<StructuredResult>>;
    fn set(&self, path: &str, result: Arc<StructuredResult>) -> Result<()>;
}

/// Eviction policy for [`MemoryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    /// Maximum number of entries; `None` means unbounded.
    pub capacity: Option<usize>,
    /// Entries older than this are treated as absent.
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn lru(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

struct CacheEntry {
    result: Arc<StructuredResult>,
    inserted_at: Instant,
    last_access: AtomicU64,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.inserted_at.elapsed() > ttl)
    }
}

/// In-memory [`ResultCache`].
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    policy: CachePolicy,
    tick: AtomicU64,
}

impl MemoryCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            tick: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Number of entries currently held, including expired ones not yet replaced.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Removes expired entries, then least-recently-used ones until there is
    /// room for one more.
    fn make_room(&self, entries: &mut HashMap<String, CacheEntry>, incoming: &str) {
        if let Some(ttl) = self.policy.ttl {
            entries.retain(|_, e| !e.is_expired(Some(ttl)));
        }
        let Some(capacity) = self.policy.capacity else {
            return;
        };
        if entries.contains_key(incoming) {
            return;
        }
        while !entries.is_empty() && entries.len() >= capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                    tracing::debug!(path = %key, "cache entry evicted");
                }
                None => break,
            }
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CachePolicy::unbounded())
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, path: &str) -> Option<Arc<StructuredResult>> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(path)?;
        if entry.is_expired(self.policy.ttl) {
            return None;
        }
        entry.last_access.store(self.next_tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.result))
    }

    fn set(&self, path: &str, result: Arc<StructuredResult>) -> Result<()> {
        if self.policy.capacity == Some(0) {
            return Err(Error::cache(
                path,
                "Set",
                Some(anyhow::anyhow!("cache capacity is zero")),
            ));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::cache(path, "Set", Some(anyhow::anyhow!("lock poisoned"))))?;
        self.make_room(&mut entries, path);
        entries.insert(
            path.to_string(),
            CacheEntry {
                result,
                inserted_at: Instant::now(),
                last_access: AtomicU64::new(self.next_tick()),
            },
        );
        Ok(())
    }
}
