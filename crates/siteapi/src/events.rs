// ABOUTME: Observability categories emitted by the resolution pipeline.
// ABOUTME: Every tracing event carries a `category` field naming the tier it is about.

use std::fmt;

/// The tier or stage a log event describes.
///
/// Events are emitted through `tracing` with `category = %Category::X`, plus a
/// qualifier in the message (`hit`, `miss`, `set`, `failed`, ...) and a
/// payload field such as `bytes`, `status` or `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Volatile cache lookups and writes.
    Cache,
    /// Durable store reads and writes.
    Storage,
    /// Outbound page fetches.
    Sent,
    /// Responses handed back to the serving component.
    Received,
    /// Per-extractor extraction results.
    Parsed,
    /// Server lifecycle.
    Serving,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cache => "Cache",
            Category::Storage => "Storage",
            Category::Sent => "Sent",
            Category::Received => "Received",
            Category::Parsed => "Parsed",
            Category::Serving => "Serving",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
