// ABOUTME: Extraction orchestration plus the declarative selector item implementation.
// ABOUTME: extract_all runs every matched definition over raw content into a StructuredResult.

//! Extraction.
//!
//! Submodules:
//! - `custom`: declarative item definitions (JSON data model).
//! - `compiled`: items with parsed selectors, implementing `Extract`.
//! - `select`: selector-based field extraction utilities.
//! - `loader`: loading item files.

pub mod compiled;
pub mod custom;
pub mod loader;
pub mod select;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::events::Category;
use crate::routes::Definition;

/// Extractor name to the values it produced.
pub type StructuredResult = BTreeMap<String, Vec<Value>>;

/// Runs every definition over `content`, keyed by definition name.
///
/// An extractor that produces nothing is a successful empty extraction. An
/// extractor that fails aborts the whole run with an `Extract` error; it is
/// not turned into an empty result. When two matched definitions share a
/// name, the later one's values are kept.
pub fn extract_all(
    path: &str,
    content: &str,
    definitions: &[Definition],
) -> Result<StructuredResult> {
    let mut results = StructuredResult::new();
    for def in definitions {
        let values = def.extract(content).map_err(|e| {
            tracing::error!(
                category = %Category::Parsed,
                path,
                item = def.name(),
                "extractor failed: {:#}",
                e
            );
            Error::extract(
                path,
                "Extract",
                Some(e.context(format!("extractor {}", def.name()))),
            )
        })?;

        if values.is_empty() {
            tracing::warn!(category = %Category::Parsed, path, item = def.name(), count = 0, "item extracted nothing");
        } else {
            tracing::info!(category = %Category::Parsed, path, item = def.name(), count = values.len(), "item extracted");
        }
        results.insert(def.name().to_string(), values);
    }
    Ok(results)
}
