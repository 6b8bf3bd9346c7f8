// ABOUTME: Compiles declarative ItemSpecs into ready-to-run extractors with parsed CSS selectors.
// ABOUTME: Invalid selectors are rejected at build time instead of silently matching nothing.

//! Compiled selector items.
//!
//! CSS selector parsing is comparatively expensive and can fail, so every
//! selector of an [`ItemSpec`] is parsed once when the item is built. The
//! resulting [`CompiledItem`] implements [`Extract`] and is what the route
//! registry stores.

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::extractors::custom::{parse_selector, ItemSpec};
use crate::extractors::select::extract_field;
use crate::routes::{Definition, Extract};

/// One parsed selector and the attribute to read, if any.
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    pub selector: Selector,
    pub attr: Option<String>,
}

/// A field with its selectors parsed.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub name: String,
    pub selectors: Vec<CompiledSelector>,
    pub allow_multiple: bool,
}

/// An [`ItemSpec`] with every selector parsed.
#[derive(Debug, Clone)]
pub struct CompiledItem {
    base: Option<Selector>,
    fields: Vec<CompiledField>,
}

fn compile_css(item: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        Error::config(
            "CompileItem",
            Some(anyhow::anyhow!("item {}: invalid selector {:?}: {}", item, css, e)),
        )
    })
}

impl CompiledItem {
    /// Parses every selector of `spec`.
    pub fn compile(spec: &ItemSpec) -> Result<Self> {
        let base = spec
            .base
            .as_deref()
            .map(|css| compile_css(&spec.name, css))
            .transpose()?;

        let mut fields = Vec::with_capacity(spec.fields.len());
        for (name, fe) in &spec.fields {
            let mut selectors = Vec::with_capacity(fe.selectors.len());
            for sel in &fe.selectors {
                let (css, attr) = parse_selector(sel);
                selectors.push(CompiledSelector {
                    selector: compile_css(&spec.name, &css)?,
                    attr,
                });
            }
            fields.push(CompiledField {
                name: name.clone(),
                selectors,
                allow_multiple: fe.allow_multiple,
            });
        }

        Ok(Self { base, fields })
    }

    fn record(&self, scope: scraper::ElementRef<'_>) -> Value {
        let mut record = Map::new();
        for field in &self.fields {
            record.insert(field.name.clone(), extract_field(scope, field));
        }
        Value::Object(record)
    }
}

impl Extract for CompiledItem {
    fn extract(&self, content: &str) -> anyhow::Result<Vec<Value>> {
        let doc = Html::parse_document(content);
        let root = doc.root_element();
        let records = match &self.base {
            Some(base) => root.select(base).map(|el| self.record(el)).collect(),
            None => vec![self.record(root)],
        };
        Ok(records)
    }
}

impl ItemSpec {
    /// Compiles this item into a registrable [`Definition`].
    pub fn into_definition(self) -> Result<Definition> {
        let compiled = CompiledItem::compile(&self)?;
        Definition::with_extractor(self.name, self.route, compiled)
    }
}
