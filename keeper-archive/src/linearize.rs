//! Flatten an article body into Markdown lines.
//!
//! The body is walked in document order and every block-level element of a
//! known kind becomes at most one line. Generic containers (`section`, `span`)
//! only contribute when they hold no nested paragraph or container, so a stack
//! of wrappers yields its innermost text once rather than once per level.
//! After the walk, a line that repeats an earlier line verbatim is dropped;
//! this also removes legitimately repeated short lines.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

use crate::asset::{IMAGES_DIR, is_hosted_image, name_for};

/// Result of [`linearize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Linearized {
    /// Surviving lines joined with one blank line between each.
    pub body: String,
    /// Hosted image URLs in first-seen order, without duplicates.
    pub images: Vec<String>,
}

/// Linearize everything below `root` (the root element itself is not emitted).
pub fn linearize(root: ElementRef<'_>) -> Linearized {
    let mut lines = Vec::new();
    let mut images: Vec<String> = Vec::new();

    for el in root.descendants().skip(1).filter_map(ElementRef::wrap) {
        let name = el.value().name();
        let line = match name {
            "p" => Some(block_text(el)),
            "section" | "span" => {
                if has_nested_container(el) {
                    None
                } else {
                    Some(block_text(el))
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = heading_level(name);
                prefixed(&"#".repeat(level), block_text(el))
            }
            "blockquote" => prefixed(">", block_text(el)),
            "li" => prefixed("-", block_text(el)),
            "img" => image_source(el).filter(|src| is_hosted_image(src)).map(|src| {
                let line = format!("![image]({IMAGES_DIR}/{})", name_for(&src));
                if !images.contains(&src) {
                    images.push(src);
                }
                line
            }),
            _ => None,
        };

        if let Some(line) = line.filter(|l| !l.trim().is_empty()) {
            lines.push(line);
        }
    }

    Linearized {
        body: dedup_lines(lines).join("\n\n"),
        images,
    }
}

/// Parse an HTML fragment and linearize its contents.
///
/// ```
/// use keeper_archive::linearize::linearize_fragment;
///
/// let out = linearize_fragment("<h2>Intro</h2><p>Hello</p><ul><li>one</li></ul>");
/// assert_eq!(out.body, "## Intro\n\nHello\n\n- one");
/// assert!(out.images.is_empty());
/// ```
pub fn linearize_fragment(html: &str) -> Linearized {
    let fragment = Html::parse_fragment(html);
    linearize(fragment.root_element())
}

/// Descendant text nodes, each trimmed, empty ones dropped, concatenated.
fn block_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

fn prefixed(marker: &str, text: String) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(format!("{marker} {text}"))
}

fn heading_level(name: &str) -> usize {
    name[1..].parse().unwrap_or(1)
}

fn has_nested_container(el: ElementRef<'_>) -> bool {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|d| matches!(d.value().name(), "p" | "section" | "span"))
}

/// Lazy-load attribute first, then the eager one; empty values don't count.
fn image_source(el: ElementRef<'_>) -> Option<String> {
    ["data-src", "src"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn dedup_lines(lines: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(line.clone()))
        .collect()
}
