// ABOUTME: Durable on-disk store of raw page content keyed by request path.
// ABOUTME: Keys are SHA-256 file names; each file holds a JSON envelope with the original path.

//! Durable page store.
//!
//! Pages are written to `<dir>/<sha256(path)>.json`. The envelope keeps the
//! original path, so a lookup can confirm the file really belongs to the
//! requested key. Writes go to a temporary file first and are renamed into
//! place, so readers never see a half-written page.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Storage contract for the durable tier.
///
/// Both operations are synchronous. Callers treat a read failure like a miss
/// and a write failure as "not persisted".
pub trait PageStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<String>>;
    fn save(&self, path: &str, content: &str) -> Result<()>;
}

/// On-disk envelope for one stored page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPage {
    pub path: String,
    pub fetched_at: DateTime<Utc>,
    pub content: String,
}

/// Derives the file stem used for `path`.
pub fn storage_key(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

/// Filesystem-backed [`PageStore`].
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create store dir: {}", dir.display()))
            .map_err(|e| Error::storage(dir.display().to_string(), "Open", Some(e)))?;
        tracing::debug!(dir = %dir.display(), "page store opened");
        Ok(Self { dir })
    }

    /// Default location: `<cache dir>/siteapi/pages`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("siteapi")
            .join("pages")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, path: &str) -> PathBuf {
        self.dir.join(format!("{}.json", storage_key(path)))
    }

    /// Returns true if a page is stored for `path`.
    pub fn contains(&self, path: &str) -> bool {
        matches!(self.get(path), Ok(Some(_)))
    }

    /// Reads the full envelope, including the fetch timestamp.
    pub fn get_page(&self, path: &str) -> Result<Option<StoredPage>> {
        let file = self.file_for(path);
        let bytes = match fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::storage(
                    path,
                    "Get",
                    Some(anyhow::Error::new(e).context(format!("reading {}", file.display()))),
                ))
            }
        };
        let page: StoredPage = serde_json::from_slice(&bytes).map_err(|e| {
            Error::storage(
                path,
                "Get",
                Some(anyhow::Error::new(e).context(format!("decoding {}", file.display()))),
            )
        })?;
        if page.path != path {
            tracing::warn!(
                path,
                stored = %page.path,
                "stored page belongs to a different path"
            );
            return Ok(None);
        }
        Ok(Some(page))
    }
}

impl PageStore for DiskStore {
    fn get(&self, path: &str) -> Result<Option<String>> {
        Ok(self.get_page(path)?.map(|page| page.content))
    }

    fn save(&self, path: &str, content: &str) -> Result<()> {
        let page = StoredPage {
            path: path.to_string(),
            fetched_at: Utc::now(),
            content: content.to_string(),
        };
        let data = serde_json::to_vec(&page)
            .map_err(|e| Error::storage(path, "Save", Some(anyhow::Error::new(e))))?;

        let file = self.file_for(path);
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("creating temp file in {}", self.dir.display()))
            .map_err(|e| Error::storage(path, "Save", Some(e)))?;
        tmp.write_all(&data)
            .with_context(|| format!("writing {}", tmp.path().display()))
            .map_err(|e| Error::storage(path, "Save", Some(e)))?;
        tmp.persist(&file).map_err(|e| {
            let source = anyhow::Error::new(e.error).context(format!("writing {}", file.display()));
            Error::storage(path, "Save", Some(source))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_get() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        assert_eq!(store.get("/a?b=1").unwrap(), None);
        store.save("/a?b=1", "<html>caf\u{e9}</html>").unwrap();
        assert_eq!(
            store.get("/a?b=1").unwrap().as_deref(),
            Some("<html>caf\u{e9}</html>")
        );
        assert!(store.contains("/a?b=1"));
        assert!(!store.contains("/a"));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        DiskStore::open(dir.path())
            .unwrap()
            .save("/page", "persisted")
            .unwrap();

        let reopened = DiskStore::open(dir.path()).unwrap();
        let page = reopened.get_page("/page").unwrap().unwrap();
        assert_eq!(page.content, "persisted");
        assert_eq!(page.path, "/page");
    }

    #[test]
    fn test_concurrent_saves_of_one_path_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        let bodies: Vec<String> = (0..8).map(|i| format!("<p>version {}</p>", i)).collect();

        std::thread::scope(|scope| {
            for body in &bodies {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..20 {
                        store.save("/shared", body).unwrap();
                    }
                });
            }
        });

        let stored = store.get("/shared").unwrap().unwrap();
        assert!(bodies.contains(&stored));
        // Only the final page file is left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_keys_are_filesystem_safe_and_distinct() {
        let a = storage_key("/a/b?c=../../etc");
        let b = storage_key("/a/b?c=../../etc2");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        fs::write(store.file_for("/bad"), b"not json").unwrap();
        let err = store.get("/bad").unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_mismatched_envelope_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.save("/other", "content").unwrap();
        fs::rename(store.file_for("/other"), store.file_for("/mine")).unwrap();
        assert_eq!(store.get("/mine").unwrap(), None);
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::open(dir.path().join("pages")).unwrap();
        fs::remove_dir_all(store.dir()).unwrap();
        let err = store.save("/a", "x").unwrap_err();
        assert!(err.is_storage());
    }
}
