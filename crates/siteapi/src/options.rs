// ABOUTME: Configuration for siteapi: Settings, FetchStrategy and the ApiBuilder.
// ABOUTME: ApiBuilder provides a fluent API for constructing Api instances with custom collaborators.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::api::Api;
use crate::cache::{CachePolicy, MemoryCache, ResultCache};
use crate::error::{Error, Result};
use crate::resource::browser::{BrowserFetcher, BrowserOptions};
use crate::resource::{DirectFetcher, DirectOptions, Fetcher};
use crate::routes::{Definition, Registry};
use crate::storage::{DiskStore, PageStore};

/// How pages are retrieved on a store miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    /// Plain HTTP GET.
    #[default]
    Direct,
    /// Render in headless Chromium.
    Browser,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchStrategy::Direct => "direct",
            FetchStrategy::Browser => "browser",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FetchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "direct" | "http" => Ok(FetchStrategy::Direct),
            "browser" | "ajax" | "chromium" => Ok(FetchStrategy::Browser),
            other => Err(Error::config(
                "ParseStrategy",
                Some(anyhow::anyhow!("unknown fetch strategy: {}", other)),
            )),
        }
    }
}

/// Configuration for an [`Api`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// Scheme and host (and optional path prefix) that request paths are appended to.
    pub base_url: String,
    pub strategy: FetchStrategy,
    /// Upper bound for one fetch, including browser rendering.
    pub timeout: Duration,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    /// Query parameters added to every fetch.
    pub params: Vec<(String, String)>,
    pub store_dir: PathBuf,
    pub cache: CachePolicy,
    /// Chromium executable for the browser strategy.
    pub browser_executable: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            strategy: FetchStrategy::Direct,
            timeout: Duration::from_secs(30),
            user_agent: format!("siteapi/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
            params: Vec::new(),
            store_dir: DiskStore::default_dir(),
            cache: CachePolicy::unbounded(),
            browser_executable: None,
        }
    }
}

/// Builder for constructing Api instances with custom configuration.
///
/// Collaborators (fetcher, store, cache) default to the ones described by
/// [`Settings`]; tests and embedders can inject their own.
pub struct ApiBuilder {
    settings: Settings,
    registry: Registry,
    fetcher: Option<Arc<dyn Fetcher>>,
    store: Option<Arc<dyn PageStore>>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl ApiBuilder {
    /// Create a new ApiBuilder for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_settings(Settings {
            base_url: base_url.into(),
            ..Settings::default()
        })
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            registry: Registry::new(),
            fetcher: None,
            store: None,
            cache: None,
        }
    }

    /// Select the fetch strategy.
    pub fn strategy(mut self, strategy: FetchStrategy) -> Self {
        self.settings.strategy = strategy;
        self
    }

    /// Set the fetch timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = user_agent.into();
        self
    }

    /// Add a custom header to all direct fetches.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter to all fetches.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.params.push((key.into(), value.into()));
        self
    }

    /// Set the directory of the default disk store.
    pub fn store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.store_dir = dir.into();
        self
    }

    /// Set the eviction policy of the default memory cache.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.settings.cache = policy;
        self
    }

    /// Set the Chromium executable used by the browser strategy.
    pub fn browser_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.browser_executable = Some(path.into());
        self
    }

    /// Register an extractor definition.
    pub fn register(mut self, definition: Definition) -> Self {
        self.registry.register(definition);
        self
    }

    /// Register several definitions, e.g. the output of `load_items_file`.
    pub fn register_all(mut self, definitions: impl IntoIterator<Item = Definition>) -> Self {
        for def in definitions {
            self.registry.register(def);
        }
        self
    }

    /// Use a custom fetcher instead of the one selected by the strategy.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use a custom durable store.
    pub fn store(mut self, store: Arc<dyn PageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom volatile cache.
    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the Api, launching the browser when the browser strategy is selected.
    pub async fn build(self) -> Result<Api> {
        let base_url = url::Url::parse(&self.settings.base_url).map_err(|e| {
            Error::invalid_url(
                &self.settings.base_url,
                "Build",
                Some(anyhow::anyhow!("invalid base URL: {}", e)),
            )
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::invalid_url(
                &self.settings.base_url,
                "Build",
                Some(anyhow::anyhow!("base URL must be absolute")),
            ));
        }

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(f) => f,
            None => default_fetcher(&self.settings).await?,
        };
        let store: Arc<dyn PageStore> = match self.store {
            Some(s) => s,
            None => Arc::new(DiskStore::open(&self.settings.store_dir)?),
        };
        let cache: Arc<dyn ResultCache> = match self.cache {
            Some(c) => c,
            None => Arc::new(MemoryCache::new(self.settings.cache)),
        };

        Ok(Api::new(self.settings, self.registry, fetcher, store, cache))
    }
}

/// Browser navigation budget: a tenth (at most one second) less than the
/// fetch timeout, so the browser reports its own timeout before the
/// resolver's deadline cancels it.
pub(crate) fn navigation_timeout(fetch_timeout: Duration) -> Duration {
    fetch_timeout.saturating_sub((fetch_timeout / 10).min(Duration::from_secs(1)))
}

async fn default_fetcher(settings: &Settings) -> Result<Arc<dyn Fetcher>> {
    match settings.strategy {
        FetchStrategy::Direct => {
            let client = reqwest::Client::builder()
                .user_agent(settings.user_agent.clone())
                .timeout(settings.timeout)
                .build()
                .map_err(|e| Error::config("Build", Some(anyhow::Error::new(e))))?;
            let opts = DirectOptions {
                headers: settings.headers.clone(),
                params: settings.params.clone(),
            };
            Ok(Arc::new(DirectFetcher::new(client, opts)))
        }
        FetchStrategy::Browser => {
            let opts = BrowserOptions {
                executable: settings.browser_executable.clone(),
                navigation_timeout: navigation_timeout(settings.timeout),
                user_agent: Some(settings.user_agent.clone()),
                params: settings.params.clone(),
            };
            Ok(Arc::new(BrowserFetcher::launch(opts).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("browser".parse::<FetchStrategy>().unwrap(), FetchStrategy::Browser);
        assert_eq!("AJAX".parse::<FetchStrategy>().unwrap(), FetchStrategy::Browser);
        assert_eq!("direct".parse::<FetchStrategy>().unwrap(), FetchStrategy::Direct);
        assert_eq!(FetchStrategy::Browser.to_string(), "browser");
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let err = "brwoser".parse::<FetchStrategy>().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("unknown fetch strategy: brwoser"));
    }

    #[test]
    fn test_navigation_timeout_is_shorter_than_fetch_timeout() {
        assert_eq!(navigation_timeout(Duration::from_secs(30)), Duration::from_secs(29));
        assert_eq!(navigation_timeout(Duration::from_secs(5)), Duration::from_millis(4500));
        for secs in [1, 2, 30, 300] {
            let total = Duration::from_secs(secs);
            assert!(navigation_timeout(total) < total);
        }
        assert_eq!(navigation_timeout(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_builder_collects_settings() {
        let builder = ApiBuilder::new("https://example.com")
            .header("x-a", "1")
            .param("lang", "en")
            .timeout(Duration::from_secs(5))
            .cache_policy(CachePolicy::lru(10));
        assert_eq!(builder.settings.base_url, "https://example.com");
        assert_eq!(builder.settings.headers["x-a"], "1");
        assert_eq!(builder.settings.params, vec![("lang".to_string(), "en".to_string())]);
        assert_eq!(builder.settings.timeout, Duration::from_secs(5));
        assert_eq!(builder.settings.cache.capacity, Some(10));
    }

    #[tokio::test]
    async fn test_build_rejects_relative_base_url() {
        let err = ApiBuilder::new("not a url").build().await.err().unwrap();
        assert!(err.is_invalid_url());
    }
}
