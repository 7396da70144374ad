//! Markdown rendering and collision-free document writing.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::model::{Article, tag_tokens};

/// Characters that are illegal in filenames on at least one common filesystem.
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];
const MAX_TITLE_CHARS: usize = 50;

const FILE_STAMP: &str = "%Y%m%d_%H%M%S";
const DISPLAY_STAMP: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub path: PathBuf,
    pub filename: String,
}

/// `"tech, demo"` becomes `"#tech #demo"`; blank input yields an empty line.
///
/// ```
/// use keeper_archive::document::normalize_tags;
///
/// assert_eq!(normalize_tags("tech, demo"), "#tech #demo");
/// assert_eq!(normalize_tags(" , "), "");
/// ```
pub fn normalize_tags(raw: &str) -> String {
    tag_tokens(raw)
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Filesystem-safe stem for a title, or a timestamp when nothing survives.
pub fn safe_title(title: &str, now: DateTime<Local>) -> String {
    let stem: String = title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .take(MAX_TITLE_CHARS)
        .collect();
    if stem.is_empty() {
        return now.format(FILE_STAMP).to_string();
    }
    stem
}

pub fn render(article: &Article, tag_line: &str, saved_at: DateTime<Local>) -> String {
    format!(
        "# {title}\n\
         \n\
         {tag_line}\n\
         \n\
         > **Account**: {account}  \n\
         > **Author**: {author}  \n\
         > **Published**: {published}  \n\
         > **Source**: {url}\n\
         \n\
         ---\n\
         \n\
         {content}\n\
         \n\
         ---\n\
         \n\
         Saved at: {saved}\n",
        title = article.title,
        account = article.account,
        author = article.author,
        published = article.publish_time,
        url = article.url,
        content = article.content,
        saved = saved_at.format(DISPLAY_STAMP),
    )
}

/// Writes rendered articles into a directory without ever replacing a file.
#[derive(Debug, Clone)]
pub struct DocumentWriter {
    output_dir: PathBuf,
}

impl DocumentWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn write(&self, article: &Article, tags: &str) -> io::Result<WrittenDocument> {
        self.write_at(article, tags, Local::now())
    }

    /// As [`write`](Self::write) with an explicit clock.
    ///
    /// The first free name among `<stem>.md`, `<stem>_<stamp>.md`,
    /// `<stem>_<stamp>_2.md`, ... is taken, using create-new semantics.
    pub fn write_at(
        &self,
        article: &Article,
        tags: &str,
        now: DateTime<Local>,
    ) -> io::Result<WrittenDocument> {
        std::fs::create_dir_all(&self.output_dir)?;

        let stem = safe_title(&article.title, now);
        let text = render(article, &normalize_tags(tags), now);
        let stamp = now.format(FILE_STAMP).to_string();

        let mut attempt = 0usize;
        loop {
            let filename = match attempt {
                0 => format!("{stem}.md"),
                1 => format!("{stem}_{stamp}.md"),
                n => format!("{stem}_{stamp}_{n}.md"),
            };
            let path = self.output_dir.join(&filename);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(text.as_bytes())?;
                    tracing::debug!(path = %path.display(), "archive.document.written");
                    return Ok(WrittenDocument { path, filename });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(%filename, "archive.document.name_taken");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
