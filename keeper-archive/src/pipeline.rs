//! One crawl, start to finish.
//!
//! Steps run strictly in sequence: fetch page, extract, load catalog,
//! download images, write document, upsert and save the catalog. Everything
//! that can abort the crawl (unreachable page, non-article page, unreadable
//! catalog) is checked before the first byte is written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use keeper_common::{EventSink, ProgressEvent, Stage};
use thiserror::Error;

use crate::asset::{AssetReport, IMAGES_DIR, save_assets};
use crate::catalog::{CatalogError, CatalogStore};
use crate::document::{DocumentWriter, WrittenDocument};
use crate::extract::{ExtractError, extract_article, is_article_url};
use crate::fetch::{AssetFetcher, FetchError, PageFetcher};
use crate::model::CatalogEntry;

const CREATED_AT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a crawl writes. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub output_dir: PathBuf,
}

impl ArchiveConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join(IMAGES_DIR)
    }

    pub fn catalog_store(&self) -> CatalogStore {
        CatalogStore::new(&self.output_dir)
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("writing {path} failed: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Coarse failure category shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PageUnreachable,
    NotAnArticle,
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::PageUnreachable => "page unreachable",
            FailureKind::NotAnArticle => "not a valid article",
            FailureKind::Storage => "storage problem",
        })
    }
}

impl CrawlError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CrawlError::Fetch { .. } => FailureKind::PageUnreachable,
            CrawlError::Extraction(_) => FailureKind::NotAnArticle,
            CrawlError::Document { .. } | CrawlError::Catalog(_) => FailureKind::Storage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub document: WrittenDocument,
    pub entry: CatalogEntry,
    pub assets: AssetReport,
}

impl CrawlOutcome {
    pub fn images_failed(&self) -> usize {
        self.assets.failed.len()
    }
}

/// Archives single articles into [`ArchiveConfig::output_dir`].
#[derive(Clone)]
pub struct Archiver {
    config: ArchiveConfig,
    pages: Arc<dyn PageFetcher>,
    assets: Arc<dyn AssetFetcher>,
    sink: Arc<dyn EventSink>,
}

impl Archiver {
    pub fn new(
        config: ArchiveConfig,
        pages: Arc<dyn PageFetcher>,
        assets: Arc<dyn AssetFetcher>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            pages,
            assets,
            sink,
        }
    }

    /// Fetch `url`, archive it with `tags` (raw, comma-separated) and update the catalog.
    #[tracing::instrument(level = "info", skip(self, tags), fields(output = %self.config.output_dir.display()))]
    pub async fn crawl(&self, url: &str, tags: &str) -> Result<CrawlOutcome, CrawlError> {
        let url = url.trim();
        tracing::info!(%url, "archive.crawl.start");
        if !is_article_url(url) {
            self.emit(ProgressEvent::warn(
                Stage::Fetch,
                format!("{url} does not look like an article link; trying anyway"),
            ));
        }

        self.emit(ProgressEvent::info(Stage::Fetch, format!("fetching {url}")));
        let html = self.pages.fetch_page(url).await.map_err(|source| {
            self.fail(CrawlError::Fetch {
                url: url.to_string(),
                source,
            })
        })?;

        self.emit(ProgressEvent::info(Stage::Extract, "parsing article"));
        let article = extract_article(&html, url).map_err(|e| self.fail(e.into()))?;
        self.emit(ProgressEvent::info(
            Stage::Extract,
            format!("found \"{}\" with {} image(s)", article.title, article.images.len()),
        ));

        // Loaded before any write so an unreadable catalog leaves the disk untouched.
        let store = self.config.catalog_store();
        let mut catalog = store.load().map_err(|e| self.fail(e.into()))?;

        let images_dir = self.config.images_dir();
        let assets = save_assets(
            self.assets.as_ref(),
            &article.images,
            &images_dir,
            self.sink.as_ref(),
        )
        .await
        .map_err(|source| self.fail(document_error(&images_dir, source)))?;

        self.emit(ProgressEvent::info(Stage::Document, "writing document"));
        let writer = DocumentWriter::new(&self.config.output_dir);
        let now = Local::now();
        let document = writer
            .write_at(&article, tags, now)
            .map_err(|source| self.fail(document_error(&self.config.output_dir, source)))?;
        self.emit(ProgressEvent::info(
            Stage::Document,
            format!("saved {}", document.filename),
        ));

        let entry = CatalogEntry {
            filename: document.filename.clone(),
            title: article.title.clone(),
            account: article.account.clone(),
            author: article.author.clone(),
            publish_time: article.publish_time.clone(),
            url: article.url.clone(),
            tags: tags.to_string(),
            image_count: article.images.len(),
            created_at: now.format(CREATED_AT).to_string(),
        };
        catalog.upsert(entry.clone());
        store.save(&catalog).map_err(|e| self.fail(e.into()))?;
        self.emit(ProgressEvent::info(
            Stage::Catalog,
            format!("catalog holds {} article(s)", catalog.articles.len()),
        ));

        tracing::info!(
            file = %document.filename,
            images = article.images.len(),
            images_failed = assets.failed.len(),
            "archive.crawl.done"
        );
        self.emit(ProgressEvent::info(
            Stage::Done,
            format!("archived \"{}\"", article.title),
        ));

        Ok(CrawlOutcome {
            document,
            entry,
            assets,
        })
    }

    fn emit(&self, event: ProgressEvent) {
        self.sink.emit(event);
    }

    fn fail(&self, err: CrawlError) -> CrawlError {
        tracing::error!(kind = %err.kind(), error = %err, "archive.crawl.failed");
        let stage = match &err {
            CrawlError::Fetch { .. } => Stage::Fetch,
            CrawlError::Extraction(_) => Stage::Extract,
            CrawlError::Document { .. } => Stage::Document,
            CrawlError::Catalog(_) => Stage::Catalog,
        };
        self.emit(ProgressEvent::error(stage, format!("{}: {err}", err.kind())));
        err
    }
}

fn document_error(path: &Path, source: std::io::Error) -> CrawlError {
    CrawlError::Document {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_output_dir() {
        let config = ArchiveConfig::new("/tmp/out");
        assert_eq!(config.images_dir(), PathBuf::from("/tmp/out/images"));
        assert_eq!(
            config.catalog_store().path(),
            Path::new("/tmp/out/INDEX.json")
        );
    }

    #[test]
    fn failure_kinds() {
        let fetch = CrawlError::Fetch {
            url: "u".into(),
            source: FetchError::Other("boom".into()),
        };
        assert_eq!(fetch.kind(), FailureKind::PageUnreachable);

        let extract: CrawlError = ExtractError::MissingTitle { url: "u".into() }.into();
        assert_eq!(extract.kind(), FailureKind::NotAnArticle);
        assert_eq!(extract.kind().to_string(), "not a valid article");

        let doc = document_error(Path::new("x"), std::io::Error::other("disk full"));
        assert_eq!(doc.kind(), FailureKind::Storage);
    }
}
