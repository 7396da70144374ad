use serde::{Deserialize, Serialize};

/// Structured content of one fetched article page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub author: String,
    /// Name of the publishing account.
    pub account: String,
    /// Free-form, exactly as the page shows it.
    pub publish_time: String,
    /// Linearized Markdown body.
    pub content: String,
    /// Remote image URLs in first-seen order, without duplicates.
    pub images: Vec<String>,
}

/// One row of the catalog. At most one entry exists per `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub filename: String,
    pub title: String,
    pub account: String,
    pub author: String,
    pub publish_time: String,
    pub url: String,
    /// Raw comma-joined tags as the user typed them.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub image_count: usize,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub created_at: String,
}

/// Trimmed, non-empty tokens of a comma-separated tag string.
///
/// ```
/// use keeper_archive::model::tag_tokens;
///
/// let tags: Vec<_> = tag_tokens(" tech, ,demo ,").collect();
/// assert_eq!(tags, vec!["tech", "demo"]);
/// ```
pub fn tag_tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}
