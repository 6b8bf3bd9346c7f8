// ABOUTME: Main library entry point for siteapi, which turns web pages into a structured JSON API.
// ABOUTME: Re-exports the public API: Api, ApiBuilder, Definition, Resolution, Error and the tier traits.

//! siteapi - serve structured records extracted from a website's pages.
//!
//! A request path is resolved in tiers: an in-memory cache of extracted
//! results, the registered routes, an on-disk store of raw pages, and finally
//! the network (plain HTTP or a headless browser). Misses populate the store
//! and the cache on the way back.
//!
//! # Example
//!
//! ```no_run
//! use siteapi::{Api, Definition, Resolution};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), siteapi::Error> {
//!     let api = Api::builder("https://news.ycombinator.com")
//!         .register_all(siteapi::load_items_file("items.json")?)
//!         .register(Definition::new("size", "^/", |html| Ok(vec![html.len().into()]))?)
//!         .build()
//!         .await?;
//!
//!     if let Resolution::Found(result) = api.resolve("/news?p=2", &[]).await? {
//!         println!("{}", serde_json::to_string_pretty(&*result).unwrap());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod error;
pub mod events;
pub mod extractors;
pub mod options;
pub mod resource;
pub mod routes;
pub mod server;
pub mod storage;

pub use crate::api::{request_path, request_path_for_url, Api, Resolution};
pub use crate::cache::{CachePolicy, MemoryCache, ResultCache};
pub use crate::error::{Error, ErrorCode, Result};
pub use crate::events::Category;
pub use crate::extractors::custom::{FieldExtractor, ItemSpec, SelectorSpec};
pub use crate::extractors::loader::{load_items, load_items_file};
pub use crate::extractors::{extract_all, StructuredResult};
pub use crate::options::{ApiBuilder, FetchStrategy, Settings};
pub use crate::resource::browser::{BrowserFetcher, BrowserOptions};
pub use crate::resource::{DirectFetcher, DirectOptions, FetchOutcome, FetchedPage, Fetcher};
pub use crate::routes::{Definition, Extract, Registry};
pub use crate::storage::{DiskStore, PageStore, StoredPage};
