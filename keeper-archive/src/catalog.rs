//! The catalog: every archived article plus cumulative tag counts.
//!
//! The catalog file is the only source of truth. It is loaded whole, mutated
//! in memory and rewritten in full. Writes go through a sibling temp file that
//! is renamed over the old one, so a crash leaves either the old or the new
//! catalog on disk. Nothing guards against two processes updating at once.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CatalogEntry, tag_tokens};

pub const CATALOG_FILE: &str = "INDEX.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file exists but is not a catalog. History is never discarded silently.
    #[error("catalog {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub articles: Vec<CatalogEntry>,
    /// Tag → number of save events that carried it. Kept in first-seen order.
    #[serde(default)]
    pub tags: IndexMap<String, u64>,
}

impl Catalog {
    /// Replace the entry with the same `url` in place, or append.
    ///
    /// Every tag token of the new entry is counted again, even on replace:
    /// counts track save events, not distinct articles.
    ///
    /// ```
    /// use keeper_archive::catalog::Catalog;
    /// use keeper_archive::model::CatalogEntry;
    ///
    /// let entry = CatalogEntry {
    ///     filename: "a.md".into(),
    ///     title: "A".into(),
    ///     account: String::new(),
    ///     author: String::new(),
    ///     publish_time: String::new(),
    ///     url: "https://mp.weixin.qq.com/s/a".into(),
    ///     tags: "rust".into(),
    ///     image_count: 0,
    ///     created_at: "2024-01-01 00:00:00".into(),
    /// };
    /// let mut catalog = Catalog::default();
    /// catalog.upsert(entry.clone());
    /// catalog.upsert(entry);
    /// assert_eq!(catalog.articles.len(), 1);
    /// assert_eq!(catalog.tags["rust"], 2);
    /// ```
    pub fn upsert(&mut self, entry: CatalogEntry) {
        for tag in tag_tokens(&entry.tags) {
            *self.tags.entry(tag.to_string()).or_insert(0) += 1;
        }

        match self.articles.iter_mut().find(|e| e.url == entry.url) {
            Some(existing) => *existing = entry,
            None => self.articles.push(entry),
        }
    }

    pub fn list_all(&self) -> &[CatalogEntry] {
        &self.articles
    }

    /// Entries whose raw tag string contains `needle`, ignoring case, in catalog order.
    pub fn find_by_tag(&self, needle: &str) -> Vec<&CatalogEntry> {
        let needle = needle.to_lowercase();
        self.articles
            .iter()
            .filter(|e| e.tags.to_lowercase().contains(&needle))
            .collect()
    }

    /// Tags by descending count; ties keep first-seen order.
    pub fn tag_counts(&self) -> Vec<(&str, u64)> {
        let mut counts: Vec<(&str, u64)> =
            self.tags.iter().map(|(t, c)| (t.as_str(), *c)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

/// Location of the catalog file inside an output directory.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: output_dir.as_ref().join(CATALOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty catalog; an unreadable one is an error.
    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "archive.catalog.absent");
                return Ok(Catalog::default());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw).map_err(|source| {
            tracing::error!(path = %self.path.display(), error = %source, "archive.catalog.corrupt");
            CatalogError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Rewrite the whole catalog atomically.
    pub fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(io_err)?;
        let json = serde_json::to_string_pretty(catalog)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            articles = catalog.articles.len(),
            tags = catalog.tags.len(),
            "archive.catalog.saved"
        );
        Ok(())
    }
}
