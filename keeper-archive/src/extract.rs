//! Article field extraction from full page markup.
//!
//! Each field is looked up through an ordered list of selectors: the regular
//! article layout first, then the alternate ids used by older and activity
//! pages. A field that never matches is left empty. The title is the
//! exception: without one the page is treated as not being an article at all
//! (deleted, expired or access-restricted pages render without it).

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::linearize::linearize;
use crate::model::Article;

/// Host serving article pages.
pub const ARTICLE_HOST: &str = "mp.weixin.qq.com";

const TITLE: &[&str] = &["h1.rich_media_title", "h1#activity-name"];
const ACCOUNT: &[&str] = &["a.weui-wa-hotarea", "strong.profile_nickname"];
const AUTHOR: &[&str] = &["span.rich_media_meta_text"];
const PUBLISH_TIME: &[&str] = &["em#publish_time"];
const CONTENT: &[&str] = &["div.rich_media_content", "div#js_content"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no article title found on {url}")]
    MissingTitle { url: String },
}

/// Build an [`Article`] from page markup.
///
/// ```
/// use keeper_archive::extract::extract_article;
///
/// let html = r#"<h1 class="rich_media_title"> Hi </h1>
///               <div id="js_content"><p>Body</p></div>"#;
/// let article = extract_article(html, "https://mp.weixin.qq.com/s/x").unwrap();
/// assert_eq!(article.title, "Hi");
/// assert_eq!(article.content, "Body");
/// assert_eq!(article.author, "");
/// ```
pub fn extract_article(html: &str, url: &str) -> Result<Article, ExtractError> {
    let document = Html::parse_document(html);

    let title = field_text(&document, TITLE);
    if title.is_empty() {
        return Err(ExtractError::MissingTitle {
            url: url.to_string(),
        });
    }

    let (content, images) = match first_match(&document, CONTENT) {
        Some(region) => {
            let out = linearize(region);
            (out.body, out.images)
        }
        None => (String::new(), Vec::new()),
    };

    Ok(Article {
        url: url.to_string(),
        title,
        author: field_text(&document, AUTHOR),
        account: field_text(&document, ACCOUNT),
        publish_time: field_text(&document, PUBLISH_TIME),
        content,
        images,
    })
}

/// Whether `raw` looks like an article link on the publishing platform.
///
/// ```
/// use keeper_archive::extract::is_article_url;
///
/// assert!(is_article_url("https://mp.weixin.qq.com/s/AbCdEf"));
/// assert!(!is_article_url("https://example.com/s/AbCdEf"));
/// assert!(!is_article_url("mp.weixin.qq.com/s/AbCdEf"));
/// ```
pub fn is_article_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str() == Some(ARTICLE_HOST)
        }
        Err(_) => false,
    }
}

fn first_match<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document.select(&selector).next()
    })
}

fn field_text(document: &Html, selectors: &[&str]) -> String {
    first_match(document, selectors)
        .map(|el| el.text().map(str::trim).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://mp.weixin.qq.com/s/sample";

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head><title>page</title></head><body>{body}</body></html>")
    }

    #[test]
    fn primary_selectors() {
        let html = page(
            r##"<h1 class="rich_media_title" id="activity-name">
                   Primary Title
               </h1>
               <span class="rich_media_meta rich_media_meta_text">Jane</span>
               <a class="wx_tap_link weui-wa-hotarea" href="#">Daily Notes</a>
               <em id="publish_time" class="rich_media_meta">2024-05-01 08:00</em>
               <div class="rich_media_content" id="js_content"><p>Hello world</p></div>"##,
        );
        let article = extract_article(&html, URL).unwrap();
        assert_eq!(article.title, "Primary Title");
        assert_eq!(article.author, "Jane");
        assert_eq!(article.account, "Daily Notes");
        assert_eq!(article.publish_time, "2024-05-01 08:00");
        assert_eq!(article.content, "Hello world");
        assert_eq!(article.url, URL);
    }

    #[test]
    fn alternate_selectors_for_legacy_pages() {
        let html = page(
            r#"<h1 id="activity-name">Legacy</h1>
               <strong class="profile_nickname">Old Account</strong>
               <div id="js_content"><section><span>Body text</span></section></div>"#,
        );
        let article = extract_article(&html, URL).unwrap();
        assert_eq!(article.title, "Legacy");
        assert_eq!(article.account, "Old Account");
        assert_eq!(article.content, "Body text");
    }

    #[test]
    fn missing_optional_fields_are_empty() {
        let html = page(r#"<h1 class="rich_media_title">Only Title</h1>"#);
        let article = extract_article(&html, URL).unwrap();
        assert_eq!(article.author, "");
        assert_eq!(article.account, "");
        assert_eq!(article.publish_time, "");
        assert_eq!(article.content, "");
        assert!(article.images.is_empty());
    }

    #[test]
    fn missing_title_is_an_error() {
        let html = page(r#"<div class="weui-msg"><p>This content has been deleted</p></div>"#);
        assert_eq!(
            extract_article(&html, URL),
            Err(ExtractError::MissingTitle { url: URL.into() })
        );
    }

    #[test]
    fn whitespace_title_counts_as_missing() {
        let html = page(r#"<h1 class="rich_media_title">   </h1><div id="js_content"><p>x</p></div>"#);
        assert!(extract_article(&html, URL).is_err());
    }

    #[test]
    fn article_url_requires_platform_host() {
        assert!(is_article_url("http://mp.weixin.qq.com/s?__biz=abc&mid=1"));
        assert!(!is_article_url("https://mp.weixin.qq.com.evil.example/s/x"));
        assert!(!is_article_url(""));
    }
}
