// ABOUTME: Loads declarative item definitions from JSON text or files.
// ABOUTME: Produces compiled Definitions ready for registration.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::error::{Error, Result};
use crate::extractors::custom::ItemSpec;
use crate::routes::Definition;

/// Parses a JSON array of items and compiles each into a [`Definition`].
pub fn load_items(json: &str) -> Result<Vec<Definition>> {
    let items: Vec<ItemSpec> = serde_json::from_str(json)
        .map_err(|e| Error::config("LoadItems", Some(anyhow::Error::new(e))))?;
    items.into_iter().map(ItemSpec::into_definition).collect()
}

/// Reads and compiles the items file at `path`.
pub fn load_items_file(path: impl AsRef<Path>) -> Result<Vec<Definition>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read items file: {}", path.display()))
        .map_err(|e| Error::config("LoadItems", Some(e)))?;
    let definitions = load_items(&json)?;
    tracing::debug!(file = %path.display(), count = definitions.len(), "items loaded");
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ITEMS: &str = r#"[
        {
            "name": "title",
            "route": "^/article/\\d+$",
            "fields": { "text": { "selectors": ["h1", "title"] } }
        },
        {
            "name": "links",
            "route": "^/",
            "base": "a",
            "fields": { "href": { "selectors": [["a", "href"]] } }
        }
    ]"#;

    #[test]
    fn load_items_succeeds() {
        let defs = load_items(ITEMS).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name(), "title");
        assert!(defs[0].matches("/article/42"));
        assert!(defs[1].matches("/anything"));
    }

    #[test]
    fn load_items_rejects_malformed_json() {
        let err = load_items("{not json").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn load_items_rejects_bad_route() {
        let err = load_items(r#"[{"name": "x", "route": "/(oops"}]"#).unwrap_err();
        assert!(err.is_invalid_route());
    }

    #[test]
    fn load_items_file_reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        fs::write(&path, ITEMS).unwrap();
        assert_eq!(load_items_file(&path).unwrap().len(), 2);

        let err = load_items_file(dir.path().join("missing.json")).unwrap_err();
        assert!(err.is_config());
    }
}
