// ABOUTME: Declarative item definitions: a route, an optional base selector and per-field selectors.
// ABOUTME: Deserialized from JSON and compiled into extractors by the compiled module.

//! Declarative selector items.
//!
//! An [`ItemSpec`] describes how to turn a page into records without writing
//! code:
//!
//! ```json
//! {
//!   "name": "posts",
//!   "route": "^/news(\\?p=\\d+)?$",
//!   "base": "tr.athing",
//!   "fields": {
//!     "title": { "selectors": ["span.titleline > a"] },
//!     "url": { "selectors": [["span.titleline > a", "href"]] }
//!   }
//! }
//! ```
//!
//! With `base`, every element matching it yields one record and field
//! selectors are evaluated inside that element. Without it, the whole
//! document yields a single record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Specifies how to select a value from the DOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    /// A CSS selector whose matches yield their text, e.g. "h1.title"
    Css(String),
    /// A CSS selector with attribute extraction, e.g. ["img", "src"]
    CssAttr(Vec<String>),
}

impl Default for SelectorSpec {
    fn default() -> Self {
        SelectorSpec::Css(String::new())
    }
}

/// Configuration for extracting a single field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldExtractor {
    /// Selectors tried in order; the first yielding a non-empty value wins.
    #[serde(default)]
    pub selectors: Vec<SelectorSpec>,
    /// Emit every match of the winning selector as an array instead of the first one.
    #[serde(default)]
    pub allow_multiple: bool,
}

/// A complete declarative item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ItemSpec {
    /// Output key in the structured result.
    pub name: String,
    /// Route pattern matched against the request path.
    pub route: String,
    /// Selector for the repeating record container.
    #[serde(default)]
    pub base: Option<String>,
    /// Field name to extractor, in a stable order.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldExtractor>,
}

/// Parses a selector spec into a CSS selector string and optional attribute name.
///
/// Returns (css_selector, optional_attribute).
pub fn parse_selector(selector: &SelectorSpec) -> (String, Option<String>) {
    match selector {
        SelectorSpec::Css(css) => (css.clone(), None),
        SelectorSpec::CssAttr(parts) => match parts.as_slice() {
            [css, attr, ..] => (css.clone(), Some(attr.clone())),
            [css] => (css.clone(), None),
            [] => (String::new(), None),
        },
    }
}
