// ABOUTME: Extractor definitions and the route registry that matches request paths to them.
// ABOUTME: Definitions pair a start-anchored regex route with a pluggable extraction operation.

//! Route registry.
//!
//! A [`Definition`] names an extraction operation and the route pattern it
//! applies to. The [`Registry`] keeps definitions in registration order and
//! returns every definition whose route matches a request path.
//!
//! Route patterns are regular expressions anchored at the start of the
//! path-plus-query key (`/article/42?page=2`). A pattern without a trailing
//! `$` therefore matches any path that begins with it.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// An operation that pulls structured values out of raw page content.
///
/// Implemented for plain closures, so ad hoc extractors can be registered
/// without a dedicated type:
///
/// ```
/// use siteapi::Definition;
///
/// let def = Definition::new("length", "^/", |html| Ok(vec![serde_json::json!(html.len())]))
///     .unwrap();
/// assert_eq!(def.name(), "length");
/// ```
pub trait Extract: Send + Sync {
    fn extract(&self, content: &str) -> anyhow::Result<Vec<Value>>;
}

impl<F> Extract for F
where
    F: Fn(&str) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    fn extract(&self, content: &str) -> anyhow::Result<Vec<Value>> {
        self(content)
    }
}

/// A registered extractor: output name, route pattern and extraction operation.
#[derive(Clone)]
pub struct Definition {
    name: String,
    pattern: String,
    route: Regex,
    extract: Arc<dyn Extract>,
}

impl Definition {
    /// Builds a definition from a closure, compiling `pattern` as a start-anchored regex.
    pub fn new<F>(name: impl Into<String>, pattern: impl Into<String>, extract: F) -> Result<Self>
    where
        F: Fn(&str) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self::from_arc(name, pattern, Arc::new(extract))
    }

    /// Builds a definition from any [`Extract`] implementation.
    pub fn with_extractor(
        name: impl Into<String>,
        pattern: impl Into<String>,
        extract: impl Extract + 'static,
    ) -> Result<Self> {
        Self::from_arc(name, pattern, Arc::new(extract))
    }

    /// Same as [`Definition::new`] for an already shared extractor.
    pub fn from_arc(
        name: impl Into<String>,
        pattern: impl Into<String>,
        extract: Arc<dyn Extract>,
    ) -> Result<Self> {
        let pattern = pattern.into();
        let route = compile_route(&pattern)?;
        Ok(Self {
            name: name.into(),
            pattern,
            route,
            extract,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The route pattern as written at registration.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns true if the route matches `path` at its start.
    pub fn matches(&self, path: &str) -> bool {
        self.route.is_match(path)
    }

    /// Runs the extraction operation.
    pub fn extract(&self, content: &str) -> anyhow::Result<Vec<Value>> {
        self.extract.extract(content)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

fn compile_route(pattern: &str) -> Result<Regex> {
    let anchored = format!("^(?:{})", pattern.strip_prefix('^').unwrap_or(pattern));
    Regex::new(&anchored).map_err(|e| {
        Error::invalid_route(pattern, "Register", Some(anyhow::anyhow!("{}", e)))
    })
}

/// Ordered collection of extractor definitions.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    definitions: Vec<Definition>,
}

impl Registry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a definition.
    ///
    /// Definitions sharing a name are all kept and matched independently. When
    /// several of them match the same path, the one registered last provides
    /// the value stored under that name.
    pub fn register(&mut self, definition: Definition) {
        if self.definitions.iter().any(|d| d.name == definition.name) {
            tracing::warn!(
                name = %definition.name,
                pattern = %definition.pattern,
                "extractor name registered more than once; later matches overwrite earlier ones"
            );
        }
        self.definitions.push(definition);
    }

    /// Returns every definition whose route matches `path`, in registration order.
    ///
    /// An empty vector means no route handles the path.
    pub fn matches(&self, path: &str) -> Vec<Definition> {
        self.definitions
            .iter()
            .filter(|d| d.matches(path))
            .cloned()
            .collect()
    }

    /// Returns the number of registered definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if no definitions are registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
