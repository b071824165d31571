//! Tutorial generation stages.
//!
//! Each stage is a [`crate::pipeline::Task`] that takes the running
//! [`GenerationContext`] and hands back an enriched one. Only
//! [`CodeCrawlerTask`] differs: it starts from the raw source location.

mod abstractions;
mod chapters;
mod crawler;
mod meta;
mod relationships;
mod writer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use abstractions::IdentifyAbstractionsTask;
pub use chapters::ChapterOrganizerTask;
pub use crawler::{is_remote, CodeCrawlerTask};
pub use meta::{MetaInfoTask, META_FILE};
pub use relationships::IdentifyRelationshipsTask;
pub use writer::{chapter_file_name, TechnicalWriterTask};

/// A source file read by the crawler, path relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstraction {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// The artifact threaded through the generation stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationContext {
    pub source: String,
    pub files: Vec<SourceFile>,
    pub abstractions: Vec<Abstraction>,
    pub summary: String,
    pub relationships: Vec<Relationship>,
    /// Indices into `abstractions`, in reading order.
    pub chapter_order: Vec<usize>,
    /// Chapter files, parallel to `chapter_order`.
    pub written_files: Vec<PathBuf>,
    pub meta_files: Vec<PathBuf>,
}

impl GenerationContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Abstractions in chapter order.
    pub fn chapters(&self) -> impl Iterator<Item = &Abstraction> {
        self.chapter_order
            .iter()
            .filter_map(|&i| self.abstractions.get(i))
    }

    fn abstraction_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.abstractions
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(wanted))
    }
}

/// Lowercase, ASCII-alphanumeric, `_`-separated form of `name`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("chapter");
    }
    slug
}

// Keeps prompts bounded for large repositories.
const LISTING_BUDGET: usize = 48 * 1024;
const EXCERPT_CHARS: usize = 1500;

fn file_listing(files: &[SourceFile]) -> String {
    let mut out = String::new();
    for file in files {
        if out.len() >= LISTING_BUDGET {
            out.push_str("\n(... further files omitted ...)\n");
            break;
        }
        let excerpt: String = file.content.chars().take(EXCERPT_CHARS).collect();
        out.push_str(&format!("--- File: {} ---\n{}\n\n", file.path, excerpt));
    }
    out
}

fn abstraction_listing(abstractions: &[Abstraction]) -> String {
    abstractions
        .iter()
        .map(|a| format!("- {}: {}", a.name, a.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_markup(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '*' || c == '`' || c == '"').trim()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn render(format: crate::config::OutputFormat, title: &str, markdown: &str) -> String {
    match format {
        crate::config::OutputFormat::Markdown => markdown.to_string(),
        crate::config::OutputFormat::Html => format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<pre>{}</pre>\n</body>\n</html>\n",
            escape_html(title),
            escape_html(markdown)
        ),
    }
}
