//! Local names for remote images and the download step that fills `images/`.
//!
//! An asset is identified by a hash of its *URL*, not its bytes. The same name
//! is used for the Markdown reference and for the file on disk, so both sides
//! go through [`name_for`]. Two URLs sharing the 12-hex-char prefix would land
//! on the same file; at personal-archive scale that is accepted.

use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use keeper_common::{EventSink, ProgressEvent, Stage};
use regex::Regex;

use crate::fetch::AssetFetcher;

/// Only images served from this host are archived.
pub const IMAGE_HOST: &str = "mmbiz.qpic.cn";
pub const HASH_PREFIX_LEN: usize = 12;
pub const DEFAULT_EXTENSION: &str = "png";
/// Subdirectory of the output root that holds downloaded images.
pub const IMAGES_DIR: &str = "images";

#[allow(clippy::expect_used)]
static FORMAT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"wx_fmt=(\w+)").expect("format token pattern is valid"));

/// Deterministic local filename for a remote image URL.
///
/// ```
/// use keeper_archive::asset::name_for;
///
/// let name = name_for("https://mmbiz.qpic.cn/abc?wx_fmt=jpeg");
/// assert!(name.ends_with(".jpeg"));
/// assert_eq!(name.len(), 12 + ".jpeg".len());
/// assert_eq!(name, name_for("https://mmbiz.qpic.cn/abc?wx_fmt=jpeg"));
/// ```
pub fn name_for(url: &str) -> String {
    let digest = blake3::hash(url.as_bytes()).to_hex();
    let prefix = &digest.as_str()[..HASH_PREFIX_LEN];
    format!("{prefix}.{}", extension_for(url))
}

fn extension_for(url: &str) -> &str {
    FORMAT_TOKEN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Whether an image URL points at the first-party image host.
pub fn is_hosted_image(url: &str) -> bool {
    url.contains(IMAGE_HOST)
}

/// Temp file in `dir`, then rename: a file at `path` is always complete.
fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// What happened to each image of an article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    pub saved: usize,
    /// Already present locally; not re-downloaded.
    pub cached: usize,
    /// URLs that could not be fetched or written. Their Markdown references dangle.
    pub failed: Vec<String>,
}

/// Download every image into `dir`, one at a time, skipping files that already exist.
///
/// Individual failures are reported through `sink` and the returned report;
/// they never abort the loop. Only failing to create `dir` itself is an error.
pub async fn save_assets(
    fetcher: &dyn AssetFetcher,
    images: &[String],
    dir: &Path,
    sink: &dyn EventSink,
) -> std::io::Result<AssetReport> {
    std::fs::create_dir_all(dir)?;
    let mut report = AssetReport::default();

    for url in images {
        let filename = name_for(url);
        let path = dir.join(&filename);

        if path.exists() {
            tracing::debug!(%filename, "archive.asset.cached");
            sink.emit(ProgressEvent::info(
                Stage::Assets,
                format!("image already present: {filename}"),
            ));
            report.cached += 1;
            continue;
        }

        let bytes = match fetcher.fetch_asset(url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%url, error = %err, "archive.asset.fetch_failed");
                sink.emit(ProgressEvent::warn(
                    Stage::Assets,
                    format!("image download failed: {url}: {err}"),
                ));
                report.failed.push(url.clone());
                continue;
            }
        };

        if let Err(err) = write_atomically(dir, &path, &bytes) {
            tracing::warn!(path = %path.display(), error = %err, "archive.asset.write_failed");
            sink.emit(ProgressEvent::warn(
                Stage::Assets,
                format!("could not write {filename}: {err}"),
            ));
            report.failed.push(url.clone());
            continue;
        }

        tracing::debug!(%filename, bytes = bytes.len(), "archive.asset.saved");
        sink.emit(ProgressEvent::info(Stage::Assets, format!("saved image {filename}")));
        report.saved += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use async_trait::async_trait;
    use keeper_common::events::NullSink;

    struct Fixed(Option<Vec<u8>>);

    #[async_trait]
    impl AssetFetcher for Fixed {
        async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.0
                .clone()
                .ok_or_else(|| FetchError::Other(format!("unreachable: {url}")))
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn saved_image_is_complete_and_leaves_no_temp_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let url = "https://mmbiz.qpic.cn/one?wx_fmt=gif".to_string();
        let bytes = vec![7u8; 64 * 1024];

        let report = save_assets(&Fixed(Some(bytes.clone())), &[url.clone()], tmp.path(), &NullSink)
            .await
            .unwrap();

        assert_eq!(report.saved, 1);
        assert_eq!(entries(tmp.path()), vec![name_for(&url)]);
        assert_eq!(std::fs::read(tmp.path().join(name_for(&url))).unwrap(), bytes);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_nothing_behind() {
        let tmp = tempfile::TempDir::new().unwrap();
        let url = "https://mmbiz.qpic.cn/two?wx_fmt=png".to_string();

        let report = save_assets(&Fixed(None), &[url.clone()], tmp.path(), &NullSink)
            .await
            .unwrap();

        assert_eq!(report.failed, vec![url]);
        assert!(entries(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn existing_file_counts_as_cached() {
        let tmp = tempfile::TempDir::new().unwrap();
        let url = "https://mmbiz.qpic.cn/three".to_string();
        std::fs::write(tmp.path().join(name_for(&url)), b"old").unwrap();

        let report = save_assets(&Fixed(Some(b"new".to_vec())), &[url.clone()], tmp.path(), &NullSink)
            .await
            .unwrap();

        assert_eq!(report.cached, 1);
        assert_eq!(std::fs::read(tmp.path().join(name_for(&url))).unwrap(), b"old");
    }

    #[test]
    fn extension_comes_from_format_token() {
        assert!(name_for("https://mmbiz.qpic.cn/a/640?wx_fmt=gif&from=appmsg").ends_with(".gif"));
        assert!(name_for("https://mmbiz.qpic.cn/a/640?tp=webp&wx_fmt=jpeg").ends_with(".jpeg"));
    }

    #[test]
    fn extension_defaults_to_png() {
        assert!(name_for("https://mmbiz.qpic.cn/a/640").ends_with(".png"));
        // token present but without a value
        assert!(name_for("https://mmbiz.qpic.cn/a/640?wx_fmt=").ends_with(".png"));
    }

    #[test]
    fn name_depends_only_on_url() {
        let a = name_for("https://mmbiz.qpic.cn/one?wx_fmt=png");
        let b = name_for("https://mmbiz.qpic.cn/two?wx_fmt=png");
        assert_ne!(a, b);
        assert_eq!(a, name_for("https://mmbiz.qpic.cn/one?wx_fmt=png"));

        let stem = a.trim_end_matches(".png");
        assert_eq!(stem.len(), HASH_PREFIX_LEN);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hosted_image_check() {
        assert!(is_hosted_image("https://mmbiz.qpic.cn/x"));
        assert!(!is_hosted_image("https://example.com/x.png"));
    }
}
