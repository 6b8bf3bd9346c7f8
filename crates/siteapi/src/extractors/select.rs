// ABOUTME: Selector-based field extraction for compiled items, built on scraper.
// ABOUTME: Supports text or attribute extraction, respecting allow_multiple and selector precedence.

//! Selector-based field extraction utilities.
//!
//! Key behaviors:
//! - Selectors are tried in order; first selector yielding non-empty values wins.
//! - Text extraction joins inner text and normalizes whitespace.
//! - Attribute extraction returns the attribute value trimmed.
//! - `allow_multiple`: when true, all values of the winning selector are
//!   returned as an array (empty array when nothing matches); when false, the
//!   first value is returned as a string (null when nothing matches).

use scraper::ElementRef;
use serde_json::Value;

use crate::extractors::compiled::{CompiledField, CompiledSelector};

/// Normalizes whitespace in a string by collapsing runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the values of `field` from the descendants of `scope`.
pub fn extract_field(scope: ElementRef<'_>, field: &CompiledField) -> Value {
    let values = extract_field_text(scope, field).unwrap_or_default();
    if field.allow_multiple {
        Value::Array(values.into_iter().map(Value::String).collect())
    } else {
        values
            .into_iter()
            .next()
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}

/// Returns the non-empty values of the first selector that yields any.
///
/// With `allow_multiple` off only the first value is kept.
pub fn extract_field_text(scope: ElementRef<'_>, field: &CompiledField) -> Option<Vec<String>> {
    for spec in &field.selectors {
        let mut results = extract_from_selector(scope, spec);
        if !results.is_empty() {
            if !field.allow_multiple {
                results.truncate(1);
            }
            return Some(results);
        }
    }
    None
}

fn extract_from_selector(scope: ElementRef<'_>, spec: &CompiledSelector) -> Vec<String> {
    scope
        .select(&spec.selector)
        .filter_map(|el| match &spec.attr {
            Some(attr) => el
                .value()
                .attr(attr)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            None => {
                let text = normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "));
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        })
        .collect()
}
