use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keeper_archive::asset::name_for;
use keeper_archive::{
    ArchiveConfig, Archiver, AssetFetcher, CatalogStore, CrawlError, FailureKind, FetchError,
    PageFetcher,
};
use keeper_common::events::{ChannelSink, NullSink, Severity};
use tempfile::TempDir;

const URL: &str = "https://mp.weixin.qq.com/s/sample";
const IMG: &str = "https://mmbiz.qpic.cn/abc?wx_fmt=jpeg";

#[derive(Default)]
struct FakeWeb {
    pages: HashMap<String, String>,
    images: HashMap<String, Vec<u8>>,
    asset_calls: Mutex<Vec<String>>,
}

impl FakeWeb {
    fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    fn with_image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(url.into(), bytes.to_vec());
        self
    }

    fn asset_calls(&self) -> Vec<String> {
        self.asset_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeWeb {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Other(format!("connection refused: {url}")))
    }
}

#[async_trait]
impl AssetFetcher for FakeWeb {
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.asset_calls.lock().unwrap().push(url.to_string());
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Other(format!("404 for {url}")))
    }
}

fn sample_page() -> String {
    format!(
        r#"<html><body>
             <h1 class="rich_media_title">Sample Post</h1>
             <a class="weui-wa-hotarea">Daily Notes</a>
             <span class="rich_media_meta_text">Jane</span>
             <em id="publish_time">2024-05-01</em>
             <div class="rich_media_content" id="js_content">
               <p>Hello world</p>
               <img data-src="{IMG}">
             </div>
           </body></html>"#
    )
}

fn archiver(out: &Path, web: Arc<FakeWeb>) -> Archiver {
    Archiver::new(
        ArchiveConfig::new(out),
        web.clone(),
        web,
        Arc::new(NullSink),
    )
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn sample_post_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("articles");
    let web = Arc::new(
        FakeWeb::default()
            .with_page(URL, &sample_page())
            .with_image(IMG, b"\xff\xd8jpeg"),
    );

    let outcome = archiver(&out, web.clone())
        .crawl(URL, "tech, demo")
        .await
        .unwrap();

    assert_eq!(outcome.document.filename, "Sample Post.md");
    let text = std::fs::read_to_string(&outcome.document.path).unwrap();
    assert!(text.starts_with("# Sample Post\n\n#tech #demo\n"));
    assert!(text.contains("> **Account**: Daily Notes"));
    assert!(text.contains("> **Author**: Jane"));
    assert!(text.contains("Hello world"));

    let image_name = name_for(IMG);
    assert!(image_name.ends_with(".jpeg"));
    assert!(text.contains(&format!("![image](images/{image_name})")));
    assert_eq!(
        std::fs::read(out.join("images").join(&image_name)).unwrap(),
        b"\xff\xd8jpeg"
    );

    let catalog = CatalogStore::new(&out).load().unwrap();
    assert_eq!(catalog.articles.len(), 1);
    let entry = &catalog.articles[0];
    assert_eq!(entry, &outcome.entry);
    assert_eq!(entry.image_count, 1);
    assert_eq!(entry.tags, "tech, demo");
    assert_eq!(catalog.tags["tech"], 1);
    assert_eq!(catalog.tags["demo"], 1);

    assert_eq!(catalog.find_by_tag("tec").len(), 1);
    assert!(catalog.find_by_tag("none").is_empty());
    assert_eq!(outcome.assets.saved, 1);
    assert_eq!(outcome.images_failed(), 0);
}

#[tokio::test]
async fn recrawl_replaces_entry_and_reuses_cached_image() {
    let tmp = TempDir::new().unwrap();
    let web = Arc::new(
        FakeWeb::default()
            .with_page(URL, &sample_page())
            .with_image(IMG, b"img"),
    );
    let archiver = archiver(tmp.path(), web.clone());

    let first = archiver.crawl(URL, "tech").await.unwrap();
    let second = archiver.crawl(URL, "tech, later").await.unwrap();

    assert_ne!(first.document.path, second.document.path);
    assert_eq!(second.assets.cached, 1);
    assert_eq!(web.asset_calls(), vec![IMG.to_string()]);

    let catalog = CatalogStore::new(tmp.path()).load().unwrap();
    assert_eq!(catalog.articles.len(), 1);
    assert_eq!(catalog.articles[0].filename, second.document.filename);
    assert_eq!(catalog.tags["tech"], 2);
    assert_eq!(catalog.tags["later"], 1);
}

#[tokio::test]
async fn fetch_failure_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("articles");

    let err = archiver(&out, Arc::new(FakeWeb::default()))
        .crawl(URL, "tech")
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Fetch { .. }));
    assert_eq!(err.kind(), FailureKind::PageUnreachable);
    assert!(!out.exists());
}

#[tokio::test]
async fn page_without_title_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let web = Arc::new(FakeWeb::default().with_page(
        URL,
        "<html><body><p>This content has been deleted by the author.</p></body></html>",
    ));

    let err = archiver(tmp.path(), web).crawl(URL, "").await.unwrap_err();

    assert!(matches!(err, CrawlError::Extraction(_)));
    assert_eq!(err.kind(), FailureKind::NotAnArticle);
    assert_eq!(file_count(tmp.path()), 0);
}

#[tokio::test]
async fn failed_image_still_writes_document() {
    let tmp = TempDir::new().unwrap();
    let web = Arc::new(FakeWeb::default().with_page(URL, &sample_page()));
    let (sink, mut rx) = ChannelSink::new();
    let archiver = Archiver::new(
        ArchiveConfig::new(tmp.path()),
        web.clone(),
        web,
        Arc::new(sink),
    );

    let outcome = archiver.crawl(URL, "").await.unwrap();

    assert_eq!(outcome.assets.failed, vec![IMG.to_string()]);
    assert!(outcome.document.path.exists());
    assert!(!tmp.path().join("images").join(name_for(IMG)).exists());
    assert_eq!(CatalogStore::new(tmp.path()).load().unwrap().articles[0].image_count, 1);

    let mut warnings = 0;
    while let Ok(event) = rx.try_recv() {
        if event.severity == Severity::Warn {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 1);
}

#[tokio::test]
async fn corrupt_catalog_aborts_before_writing() {
    let tmp = TempDir::new().unwrap();
    let catalog_path = tmp.path().join("INDEX.json");
    std::fs::write(&catalog_path, "not json at all").unwrap();
    let web = Arc::new(
        FakeWeb::default()
            .with_page(URL, &sample_page())
            .with_image(IMG, b"img"),
    );

    let err = archiver(tmp.path(), web.clone())
        .crawl(URL, "tech")
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Catalog(_)));
    assert_eq!(err.kind(), FailureKind::Storage);
    assert_eq!(file_count(tmp.path()), 1);
    assert_eq!(std::fs::read_to_string(&catalog_path).unwrap(), "not json at all");
    assert!(web.asset_calls().is_empty());
}
