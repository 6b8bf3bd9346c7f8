// ABOUTME: Scripted-browser fetch strategy driving a headless Chromium through chromiumoxide.
// ABOUTME: The single browser session is shared, so fetches are serialized behind an async mutex.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{log_sent, FetchOutcome, FetchedPage, Fetcher};
use crate::error::{Error, Result};
use crate::events::Category;

/// Environment variable that overrides Chromium discovery.
pub const CHROMIUM_PATH_ENV: &str = "SITEAPI_CHROMIUM_PATH";

/// Options for the browser strategy.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Explicit executable; discovered with [`find_chromium`] when `None`.
    pub executable: Option<PathBuf>,
    /// Upper bound for one navigation.
    pub navigation_timeout: Duration,
    pub user_agent: Option<String>,
    /// Query parameters appended to every navigation, before per-call params.
    pub params: Vec<(String, String)>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            navigation_timeout: Duration::from_secs(30),
            user_agent: None,
            params: Vec::new(),
        }
    }
}

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Fetches pages by rendering them in headless Chromium.
pub struct BrowserFetcher {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    opts: BrowserOptions,
}

impl BrowserFetcher {
    /// Launches headless Chromium with image loading disabled.
    pub async fn launch(opts: BrowserOptions) -> Result<Self> {
        let chrome_path = opts.executable.clone().or_else(find_chromium).ok_or_else(|| {
            Error::config(
                "LaunchBrowser",
                Some(anyhow::anyhow!(
                    "Chromium not found; set {} or install chromium",
                    CHROMIUM_PATH_ENV
                )),
            )
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--blink-settings=imagesEnabled=false");
        if let Some(ref ua) = opts.user_agent {
            builder = builder.arg(format!("--user-agent={}", ua));
        }
        let config = builder.build().map_err(|e| {
            Error::config(
                "LaunchBrowser",
                Some(anyhow::anyhow!("failed to build browser config: {e}")),
            )
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            Error::config(
                "LaunchBrowser",
                Some(anyhow::anyhow!("failed to launch Chromium: {e}")),
            )
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("headless browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            opts,
        })
    }

    async fn render(&self, browser: &Browser, url: &str) -> anyhow::Result<String> {
        let page = browser.new_page(url).await?;
        let closing = page.clone();
        // Runs on every exit, including cancellation by an outer timeout.
        let _close = CloseOnDrop::new(async move {
            if let Err(e) = closing.close().await {
                tracing::debug!(error = %e, "failed to close browser tab");
            }
        });
        page.wait_for_navigation().await?;
        Ok(page.content().await?)
    }
}

/// Spawns `cleanup` onto the current runtime when dropped.
struct CloseOnDrop<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    cleanup: Option<F>,
}

impl<F> CloseOnDrop<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }
}

impl<F> Drop for CloseOnDrop<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(cleanup);
            }
        }
    }
}

/// Builds the navigation URL: `url`, then the default params, then `params`.
pub fn navigation_url(
    url: &str,
    defaults: &[(String, String)],
    params: &[(String, String)],
) -> Result<String> {
    if defaults.is_empty() && params.is_empty() {
        return Ok(url.to_string());
    }
    let mut parsed = url::Url::parse(url).map_err(|e| {
        Error::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    parsed
        .query_pairs_mut()
        .extend_pairs(defaults)
        .extend_pairs(params);
    Ok(parsed.to_string())
}

/// Turns rendered markup into a page; a blank render counts as a failed fetch.
pub fn rendered_page(url: String, text: String) -> Result<FetchedPage> {
    if text.trim().is_empty() {
        tracing::error!(category = %Category::Sent, url = %url, bytes = 0, "browser rendered an empty page");
        return Err(Error::fetch(
            &url,
            "Fetch",
            Some(anyhow::anyhow!("browser returned empty page")),
        ));
    }
    Ok(FetchedPage {
        url,
        text,
        outcome: FetchOutcome::Ok { status: 200 },
    })
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<FetchedPage> {
        let target = navigation_url(url, &self.opts.params, params)?;

        // One page at a time: the session is shared, stateful and not reentrant.
        let browser = self.browser.lock().await;
        let rendered = tokio::time::timeout(
            self.opts.navigation_timeout,
            self.render(&browser, &target),
        )
        .await;
        drop(browser);

        let text = match rendered {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return Err(Error::fetch(
                    &target,
                    "Fetch",
                    Some(e.context("browser navigation failed")),
                ))
            }
            Err(_) => {
                return Err(Error::timeout(
                    &target,
                    "Fetch",
                    Some(anyhow::anyhow!(
                        "navigation timed out after {}ms",
                        self.opts.navigation_timeout.as_millis()
                    )),
                ))
            }
        };

        let page = rendered_page(target, text)?;
        log_sent(&page);
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = BrowserOptions::default();
        assert!(opts.executable.is_none());
        assert_eq!(opts.navigation_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_missing_executable_is_config_error() {
        let opts = BrowserOptions {
            executable: Some(PathBuf::from("/nonexistent/chrome")),
            ..Default::default()
        };
        let err = BrowserFetcher::launch(opts).await.err().unwrap();
        assert!(err.is_config());
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_navigation_url_merges_default_params_first() {
        let url = navigation_url(
            "https://site.test/news?p=2",
            &pairs(&[("lang", "en")]),
            &pairs(&[("sort", "new")]),
        )
        .unwrap();
        assert_eq!(url, "https://site.test/news?p=2&lang=en&sort=new");
    }

    #[test]
    fn test_navigation_url_without_params_is_unchanged() {
        let url = navigation_url("data:text/html,<p>hi</p>", &[], &[]).unwrap();
        assert_eq!(url, "data:text/html,<p>hi</p>");

        let err = navigation_url("not a url", &pairs(&[("a", "1")]), &[]).unwrap_err();
        assert!(err.is_invalid_url());
    }

    #[test]
    fn test_blank_render_is_fetch_error() {
        for blank in ["", "  \n\t "] {
            let err = rendered_page("https://site.test/a".into(), blank.into()).unwrap_err();
            assert!(err.is_fetch());
            assert_eq!(err.path, "https://site.test/a");
        }
    }

    #[test]
    fn test_rendered_markup_is_ok_page() {
        let page = rendered_page("https://site.test/a".into(), "<p>hi</p>".into()).unwrap();
        assert_eq!(page.outcome, FetchOutcome::Ok { status: 200 });
        assert_eq!(page.text, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_close_runs_when_render_is_cancelled() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let hung = async move {
            let _close = CloseOnDrop::new(async move {
                let _ = tx.send(());
            });
            std::future::pending::<()>().await;
        };
        assert!(tokio::time::timeout(Duration::from_millis(20), hung)
            .await
            .is_err());
        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("cleanup never ran")
            .unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_render_data_url() {
        let fetcher = BrowserFetcher::launch(BrowserOptions::default())
            .await
            .expect("failed to launch browser");
        let page = fetcher
            .fetch("data:text/html,<h1>Hello</h1><p>World</p>", &[])
            .await
            .expect("render failed");
        assert!(page.text.contains("<h1>Hello</h1>"));
        assert_eq!(page.outcome, FetchOutcome::Ok { status: 200 });
    }
}
