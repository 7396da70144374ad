//! Single-article archiving for keeper.
//!
//! An article page is parsed into an [`model::Article`], its body flattened to
//! Markdown, its images stored under `images/` by URL-derived name, and the
//! result written as one `.md` file next to an `INDEX.json` catalog that keeps
//! one entry per source URL plus running tag counts.
//!
//! Fetching sits behind [`fetch::PageFetcher`] and [`fetch::AssetFetcher`];
//! [`fetch::HttpFetcher`] implements both over `keeper_http`.
//!
//! # Examples
//! ```no_run
//! use std::sync::Arc;
//! use keeper_archive::{ArchiveConfig, Archiver, HttpFetcher};
//! use keeper_common::events::TracingSink;
//! use keeper_http::{FetchPolicy, HttpClient};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let fetcher = Arc::new(HttpFetcher::new(HttpClient::new(FetchPolicy::default())?));
//! let archiver = Archiver::new(
//!     ArchiveConfig::new("articles"),
//!     fetcher.clone(),
//!     fetcher,
//!     Arc::new(TracingSink),
//! );
//! let outcome = archiver.crawl("https://mp.weixin.qq.com/s/abc", "tech, demo").await?;
//! println!("saved {}", outcome.document.filename);
//! # Ok(())
//! # }
//! ```
pub mod asset;
pub mod catalog;
pub mod document;
pub mod extract;
pub mod fetch;
pub mod linearize;
pub mod model;
pub mod pipeline;

pub use catalog::{Catalog, CatalogError, CatalogStore};
pub use extract::{ExtractError, is_article_url};
pub use fetch::{AssetFetcher, FetchError, HttpFetcher, PageFetcher};
pub use model::{Article, CatalogEntry};
pub use pipeline::{ArchiveConfig, Archiver, CrawlError, CrawlOutcome, FailureKind};

