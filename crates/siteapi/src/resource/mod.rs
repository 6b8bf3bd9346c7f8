// ABOUTME: Page fetching: the Fetcher capability, its outcome types and the direct HTTP strategy.
// ABOUTME: Bodies are decoded via the Content-Type charset or chardetng detection, never returned as bytes.

pub mod browser;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::events::Category;

pub use browser::BrowserFetcher;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Transport outcome of a fetch that produced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page came back with status 200 (or rendered non-empty in a browser).
    Ok { status: u16 },
    /// Content was returned, but with a non-200 status.
    Degraded { status: u16 },
}

impl FetchOutcome {
    pub fn from_status(status: u16) -> Self {
        if status == 200 {
            FetchOutcome::Ok { status }
        } else {
            FetchOutcome::Degraded { status }
        }
    }

    pub fn status(&self) -> u16 {
        match *self {
            FetchOutcome::Ok { status } | FetchOutcome::Degraded { status } => status,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded { .. })
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Ok { status } => write!(f, "ok ({})", status),
            FetchOutcome::Degraded { status } => write!(f, "degraded ({})", status),
        }
    }
}

/// Decoded page text plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub text: String,
    pub outcome: FetchOutcome,
}

/// A strategy for retrieving the text of a page.
///
/// Implementations either return decoded text with an observable outcome or
/// an error; they never hand back undecoded bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<FetchedPage>;
}

/// Emits the `Sent` event for a completed fetch.
pub(crate) fn log_sent(page: &FetchedPage) {
    match page.outcome {
        FetchOutcome::Ok { status } => tracing::info!(
            category = %Category::Sent,
            url = %page.url,
            bytes = page.text.len(),
            status,
            "page fetched"
        ),
        FetchOutcome::Degraded { status } => tracing::warn!(
            category = %Category::Sent,
            url = %page.url,
            bytes = page.text.len(),
            status,
            "page fetched with non-200 status"
        ),
    }
}

/// Options for the direct HTTP strategy.
#[derive(Debug, Clone, Default)]
pub struct DirectOptions {
    pub headers: HashMap<String, String>,
    /// Query parameters appended to every request, before per-call params.
    pub params: Vec<(String, String)>,
}

/// Fetches pages with a plain HTTP GET.
///
/// Stateless apart from the connection pool inside `reqwest::Client`, so a
/// single instance is shared across concurrent resolutions.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: reqwest::Client,
    opts: DirectOptions,
}

impl DirectFetcher {
    pub fn new(client: reqwest::Client, opts: DirectOptions) -> Self {
        Self { client, opts }
    }
}

#[async_trait]
impl Fetcher for DirectFetcher {
    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<FetchedPage> {
        let parsed_url = url::Url::parse(url).map_err(|e| {
            Error::invalid_url(url, "Fetch", Some(anyhow::anyhow!("invalid URL: {}", e)))
        })?;
        let scheme = parsed_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(Error::invalid_url(
                url,
                "Fetch",
                Some(anyhow::anyhow!("scheme must be http or https")),
            ));
        }

        let mut request = self.client.get(parsed_url);
        for (key, value) in &self.opts.headers {
            request = request.header(key, value);
        }
        if !self.opts.params.is_empty() {
            request = request.query(&self.opts.params);
        }
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await.map_err(|e| {
            let source = Some(anyhow::anyhow!("request failed: {}", e));
            if e.is_timeout() {
                Error::timeout(url, "Fetch", source)
            } else {
                Error::fetch(url, "Fetch", source)
            }
        })?;

        if let Some(len) = response.content_length() {
            if len as usize > MAX_CONTENT_LENGTH {
                return Err(Error::fetch(
                    url,
                    "Fetch",
                    Some(anyhow::anyhow!("content too large")),
                ));
            }
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = response.bytes().await.map_err(|e| {
            Error::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("failed to read body: {}", e)),
            )
        })?;
        if body.len() > MAX_CONTENT_LENGTH {
            return Err(Error::fetch(
                url,
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }

        let page = FetchedPage {
            url: final_url,
            text: decode_body(&body, content_type.as_deref()),
            outcome: FetchOutcome::from_status(status),
        };
        log_sent(&page);
        Ok(page)
    }
}

/// Decode body bytes to a String using charset from content-type header or detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    lower.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|cs| cs.trim_matches('"').trim_matches('\'').to_string())
    })
}
