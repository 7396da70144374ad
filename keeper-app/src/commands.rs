use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use keeper_archive::extract::ARTICLE_HOST;
use keeper_archive::{
    ArchiveConfig, Archiver, CatalogEntry, CatalogStore, CrawlOutcome, HttpFetcher,
    is_article_url,
};
use keeper_common::{EventSink, ProgressEvent, Severity};

/// Renders pipeline progress on stderr, one line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl EventSink for StderrSink {
    fn emit(&self, event: ProgressEvent) {
        let marker = match event.severity {
            Severity::Info => "  ",
            Severity::Warn => "! ",
            Severity::Error => "x ",
        };
        eprintln!("{marker}[{}] {}", event.stage, event.message);
    }
}

/// Everything a command needs; the output directory may change between menu actions.
pub struct Session {
    pub archive: ArchiveConfig,
    fetcher: Arc<HttpFetcher>,
    sink: Arc<dyn EventSink>,
}

impl Session {
    pub fn new(archive: ArchiveConfig, fetcher: HttpFetcher, sink: Arc<dyn EventSink>) -> Self {
        Self {
            archive,
            fetcher: Arc::new(fetcher),
            sink,
        }
    }

    fn archiver(&self) -> Archiver {
        Archiver::new(
            self.archive.clone(),
            self.fetcher.clone(),
            self.fetcher.clone(),
            self.sink.clone(),
        )
    }

    fn store(&self) -> CatalogStore {
        self.archive.catalog_store()
    }
}

/// Archive one article. Links outside the article host are refused before any request.
pub async fn crawl(session: &Session, url: &str, tags: &str) -> Result<()> {
    let url = url.trim();
    if !is_article_url(url) {
        tracing::warn!(%url, "app.crawl.rejected_url");
        anyhow::bail!("{url} is not an article link (expected https://{ARTICLE_HOST}/...)");
    }
    let outcome = session.archiver().crawl(url, tags).await.map_err(|err| {
        let kind = err.kind();
        anyhow::Error::new(err).context(format!("crawl failed ({kind})"))
    })?;
    print_outcome(&mut std::io::stdout().lock(), &outcome)
}

pub fn list(session: &Session) -> Result<()> {
    let catalog = session.store().load().context("loading catalog")?;
    let mut out = std::io::stdout().lock();
    print_entries(&mut out, catalog.list_all().iter())
}

pub fn tags(session: &Session) -> Result<()> {
    let catalog = session.store().load().context("loading catalog")?;
    let mut out = std::io::stdout().lock();
    let counts = catalog.tag_counts();
    if counts.is_empty() {
        writeln!(out, "No tags yet.")?;
    }
    for (tag, count) in counts {
        writeln!(out, "{tag:<24} {count}")?;
    }
    Ok(())
}

pub fn search(session: &Session, tag: &str) -> Result<()> {
    let catalog = session.store().load().context("loading catalog")?;
    let hits = catalog.find_by_tag(tag);
    let mut out = std::io::stdout().lock();
    writeln!(out, "{} article(s) tagged like \"{tag}\"", hits.len())?;
    print_entries(&mut out, hits.into_iter())
}

fn print_outcome(out: &mut impl Write, outcome: &CrawlOutcome) -> Result<()> {
    writeln!(out, "Saved \"{}\"", outcome.entry.title)?;
    writeln!(out, "  file:   {}", outcome.document.path.display())?;
    writeln!(
        out,
        "  images: {} saved, {} cached, {} failed",
        outcome.assets.saved,
        outcome.assets.cached,
        outcome.images_failed()
    )?;
    Ok(())
}

fn print_entries<'a>(
    out: &mut impl Write,
    entries: impl Iterator<Item = &'a CatalogEntry>,
) -> Result<()> {
    let mut shown = 0usize;
    for entry in entries {
        shown += 1;
        writeln!(out, "{shown:>3}. {}", entry.title)?;
        writeln!(
            out,
            "     {} | {} | {} | tags: {}",
            entry.account, entry.publish_time, entry.filename, entry.tags
        )?;
    }
    if shown == 0 {
        writeln!(out, "Nothing archived yet.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_common::events::NullSink;
    use keeper_http::{FetchPolicy, HttpClient};

    fn session(dir: &std::path::Path) -> Session {
        let client = HttpClient::new(FetchPolicy::immediate()).unwrap();
        Session::new(
            ArchiveConfig::new(dir),
            HttpFetcher::new(client),
            Arc::new(NullSink),
        )
    }

    #[tokio::test]
    async fn foreign_links_are_refused_before_anything_is_written() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("articles");
        let session = session(&out);

        for url in ["https://example.com/s/abc", "mp.weixin.qq.com/s/abc", ""] {
            let err = crawl(&session, url, "tech").await.unwrap_err();
            assert!(err.to_string().contains("not an article link"), "{err}");
        }
        assert!(!out.exists());
    }

    fn entry(title: &str, tags: &str) -> CatalogEntry {
        CatalogEntry {
            filename: format!("{title}.md"),
            title: title.into(),
            account: "Notes".into(),
            author: "Jane".into(),
            publish_time: "2024-05-01".into(),
            url: format!("https://mp.weixin.qq.com/s/{title}"),
            tags: tags.into(),
            image_count: 0,
            created_at: "2024-05-02 10:00:00".into(),
        }
    }

    #[test]
    fn entries_are_numbered() {
        let entries = [entry("One", "a"), entry("Two", "b")];
        let mut buf = Vec::new();
        print_entries(&mut buf, entries.iter()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("  1. One"));
        assert!(text.contains("  2. Two"));
        assert!(text.contains("tags: b"));
    }

    #[test]
    fn empty_listing_says_so() {
        let mut buf = Vec::new();
        print_entries(&mut buf, std::iter::empty()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Nothing archived yet.\n");
    }
}
