// ABOUTME: Shared call-counting fakes for the fetch, store and cache tiers.
// ABOUTME: Used by the resolver and server integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use siteapi::resource::browser::rendered_page;
use siteapi::{
    Error, FetchOutcome, FetchedPage, Fetcher, MemoryCache, PageStore, ResultCache,
    StructuredResult,
};

/// Serves canned pages by URL and counts calls.
#[derive(Default)]
pub struct FakeFetcher {
    pub pages: Mutex<HashMap<String, (u16, String)>>,
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    pub fail: bool,
    /// Treat canned pages as browser renders.
    pub rendered: bool,
}

impl FakeFetcher {
    pub fn with_page(url: &str, html: &str) -> Self {
        let fetcher = Self::default();
        fetcher.add(url, 200, html);
        fetcher
    }

    pub fn add(&self, url: &str, status: u16, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, html.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _params: &[(String, String)]) -> siteapi::Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::fetch(url, "Fetch", Some(anyhow::anyhow!("connection reset"))));
        }
        let page = self.pages.lock().unwrap().get(url).cloned();
        match page {
            Some((_, text)) if self.rendered => rendered_page(url.to_string(), text),
            Some((status, text)) => Ok(FetchedPage {
                url: url.to_string(),
                text,
                outcome: FetchOutcome::from_status(status),
            }),
            None => Err(Error::fetch(url, "Fetch", Some(anyhow::anyhow!("no such page")))),
        }
    }
}

/// In-memory store that counts reads and writes and can be made to fail.
#[derive(Default)]
pub struct FakeStore {
    pub pages: Mutex<HashMap<String, String>>,
    pub gets: AtomicUsize,
    pub saves: AtomicUsize,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl FakeStore {
    pub fn insert(&self, path: &str, content: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn stored(&self, path: &str) -> Option<String> {
        self.pages.lock().unwrap().get(path).cloned()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PageStore for FakeStore {
    fn get(&self, path: &str) -> siteapi::Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(Error::storage(path, "Get", Some(anyhow::anyhow!("disk unreadable"))));
        }
        Ok(self.stored(path))
    }

    fn save(&self, path: &str, content: &str) -> siteapi::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(Error::storage(path, "Save", Some(anyhow::anyhow!("disk full"))));
        }
        self.insert(path, content);
        Ok(())
    }
}

/// Wraps a MemoryCache and counts calls; `set` can be made to fail.
#[derive(Default)]
pub struct CountingCache {
    pub inner: MemoryCache,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub fail_sets: bool,
}

impl CountingCache {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn preload(&self, path: &str, result: StructuredResult) {
        self.inner.set(path, Arc::new(result)).unwrap();
    }
}

impl ResultCache for CountingCache {
    fn get(&self, path: &str) -> Option<Arc<StructuredResult>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(path)
    }

    fn set(&self, path: &str, result: Arc<StructuredResult>) -> siteapi::Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets {
            return Err(Error::cache(path, "Set", Some(anyhow::anyhow!("cache unavailable"))));
        }
        self.inner.set(path, result)
    }
}

/// Pulls the text of the first <title> element.
pub fn page_title(html: &str) -> Option<String> {
    let start = html.find("<title>")? + "<title>".len();
    let end = html[start..].find("</title>")? + start;
    Some(html[start..end].trim().to_string())
}
