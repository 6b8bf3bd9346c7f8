// ABOUTME: The Api context and its resolver: cache, route match, store, fetch, extract, cache-write.
// ABOUTME: Each tier short-circuits everything below it; store and cache failures degrade gracefully.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::ResultCache;
use crate::error::{Error, Result};
use crate::events::Category;
use crate::extractors::{extract_all, StructuredResult};
use crate::options::{ApiBuilder, Settings};
use crate::resource::Fetcher;
use crate::routes::Registry;
use crate::storage::PageStore;

/// Outcome of a resolution that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Extracted records, possibly served from the volatile cache.
    Found(Arc<StructuredResult>),
    /// No registered route matches the path.
    Unhandled,
}

impl Resolution {
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Resolution::Unhandled)
    }

    pub fn found(self) -> Option<Arc<StructuredResult>> {
        match self {
            Resolution::Found(result) => Some(result),
            Resolution::Unhandled => None,
        }
    }
}

/// Builds the canonical request key from a path and an optional query string.
///
/// ```
/// assert_eq!(siteapi::request_path("/foo", Some("bar=1")), "/foo?bar=1");
/// assert_eq!(siteapi::request_path("/foo", Some("")), "/foo");
/// assert_eq!(siteapi::request_path("foo", None), "/foo");
/// ```
pub fn request_path(path: &str, query: Option<&str>) -> String {
    let mut key = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(q);
    }
    key
}

/// Builds the request key for a full URL, dropping scheme, host and fragment.
pub fn request_path_for_url(url: &url::Url) -> String {
    request_path(url.path(), url.query())
}

/// Per-path locks coalescing concurrent misses for the same key.
///
/// Each slot counts the callers holding or waiting on its lock. The count
/// is decremented by the caller's guard, so a waiter cancelled mid-await
/// still releases its share and the slot is removed at zero.
#[derive(Default)]
struct Inflight {
    locks: Mutex<HashMap<String, Slot>>,
}

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

struct InflightGuard<'a> {
    inflight: &'a Inflight,
    key: String,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Inflight {
    async fn acquire(&self, key: &str) -> InflightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = locks.entry(key.to_string()).or_insert_with(|| Slot {
                lock: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };
        // Registered before waiting, so dropping this future still releases the slot.
        let mut guard = InflightGuard {
            inflight: self,
            key: key.to_string(),
            permit: None,
        };
        guard.permit = Some(lock.lock_owned().await);
        guard
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        let mut locks = self
            .inflight
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = locks.get_mut(&self.key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                locks.remove(&self.key);
            }
        }
    }
}

/// The resolution context: registered routes plus the cache, store and fetch tiers.
///
/// Constructed once through [`ApiBuilder`] and shared (e.g. in an `Arc`)
/// by every request handler.
pub struct Api {
    settings: Settings,
    registry: Registry,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn PageStore>,
    cache: Arc<dyn ResultCache>,
    inflight: Inflight,
}

impl Api {
    /// Start building an Api that fetches pages below `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ApiBuilder {
        ApiBuilder::new(base_url)
    }

    pub(crate) fn new(
        settings: Settings,
        registry: Registry,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn PageStore>,
        cache: Arc<dyn ResultCache>,
    ) -> Self {
        Self {
            settings,
            registry,
            fetcher,
            store,
            cache,
            inflight: Inflight::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The full upstream URL for a request path.
    pub fn page_url(&self, path: &str) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Entry point for a serving component that could not route a request itself.
    pub async fn handle_miss(&self, path: &str, query: Option<&str>) -> Result<Resolution> {
        self.resolve(&request_path(path, query), &[]).await
    }

    /// Resolves `path` to structured records.
    ///
    /// Order: volatile cache, route match, durable store, fetch, extraction,
    /// cache write. Fetch and extraction failures are returned; store and
    /// cache failures are logged and the pipeline carries on.
    pub async fn resolve(&self, path: &str, params: &[(String, String)]) -> Result<Resolution> {
        if let Some(hit) = self.cached(path) {
            return Ok(Resolution::Found(hit));
        }

        let definitions = self.registry.matches(path);
        if definitions.is_empty() {
            tracing::debug!(path, "no route matches");
            return Ok(Resolution::Unhandled);
        }

        let _guard = self.inflight.acquire(path).await;
        // Another caller may have resolved the path while we waited.
        if let Some(hit) = self.cached(path) {
            return Ok(Resolution::Found(hit));
        }

        let content = self.load(path, params).await?;
        let result = Arc::new(extract_all(path, &content, &definitions)?);

        match self.cache.set(path, Arc::clone(&result)) {
            Ok(()) => tracing::info!(category = %Category::Cache, path, "cache set"),
            Err(e) => tracing::warn!(category = %Category::Cache, path, error = %e, "cache set failed"),
        }
        Ok(Resolution::Found(result))
    }

    fn cached(&self, path: &str) -> Option<Arc<StructuredResult>> {
        let hit = self.cache.get(path);
        if hit.is_some() {
            tracing::info!(category = %Category::Cache, path, "cache hit");
        } else {
            tracing::debug!(category = %Category::Cache, path, "cache miss");
        }
        hit
    }

    /// Raw content for `path`: from the store, or fetched and then stored.
    async fn load(&self, path: &str, params: &[(String, String)]) -> Result<String> {
        match self.store.get(path) {
            Ok(Some(content)) => {
                tracing::info!(category = %Category::Storage, path, bytes = content.len(), "storage hit");
                return Ok(content);
            }
            Ok(None) => tracing::debug!(category = %Category::Storage, path, "storage miss"),
            Err(e) => tracing::warn!(
                category = %Category::Storage,
                path,
                error = %e,
                "storage read failed; fetching instead"
            ),
        }

        let url = self.page_url(path);
        let fetched = tokio::time::timeout(self.settings.timeout, self.fetcher.fetch(&url, params))
            .await
            .map_err(|_| {
                tracing::error!(category = %Category::Sent, url = %url, "fetch timed out");
                Error::timeout(
                    &url,
                    "Fetch",
                    Some(anyhow::anyhow!(
                        "no response within {}ms",
                        self.settings.timeout.as_millis()
                    )),
                )
            })?;
        let page = fetched.map_err(|e| {
            tracing::error!(category = %Category::Sent, url = %url, error = %e, "fetch failed");
            e
        })?;

        match self.store.save(path, &page.text) {
            Ok(()) => tracing::info!(category = %Category::Storage, path, bytes = page.text.len(), "storage set"),
            Err(e) => tracing::warn!(
                category = %Category::Storage,
                path,
                error = %e,
                "storage write failed; continuing without persisted copy"
            ),
        }
        Ok(page.text)
    }
}
