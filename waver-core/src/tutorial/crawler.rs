use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::{GenerationContext, SourceFile};
use crate::contract::BoxError;
use crate::pipeline::{PipelineContext, Task};

const SKIPPED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

/// Reads the repository's text files into a fresh [`GenerationContext`].
///
/// Local directories are read in place. Remote git locations are shallow
/// cloned into a temporary directory that is removed once the files are read.
pub struct CodeCrawlerTask {
    max_files: usize,
    max_file_bytes: u64,
}

impl Default for CodeCrawlerTask {
    fn default() -> Self {
        Self {
            max_files: 200,
            max_file_bytes: 64 * 1024,
        }
    }
}

impl CodeCrawlerTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_files: usize, max_file_bytes: u64) -> Self {
        Self {
            max_files,
            max_file_bytes,
        }
    }
}

/// Whether `location` names a remote git repository rather than a local path.
pub fn is_remote(location: &str) -> bool {
    ["http://", "https://", "ssh://", "git://", "git@"]
        .iter()
        .any(|prefix| location.starts_with(prefix))
}

#[async_trait]
impl Task<String, GenerationContext> for CodeCrawlerTask {
    async fn execute(
        &self,
        source: String,
        ctx: &PipelineContext,
    ) -> Result<GenerationContext, BoxError> {
        let max_files = self.max_files;
        let max_bytes = self.max_file_bytes;

        let files = if is_remote(&source) {
            let checkout = tempfile::tempdir()?;
            clone(&source, checkout.path()).await?;
            tokio::task::spawn_blocking(move || {
                let files = collect_files(checkout.path(), max_files, max_bytes);
                drop(checkout);
                files
            })
            .await??
        } else {
            let root = PathBuf::from(&source);
            if !root.is_dir() {
                return Err(format!(
                    "source location '{source}' is neither a directory nor a git URL"
                )
                .into());
            }
            tokio::task::spawn_blocking(move || collect_files(&root, max_files, max_bytes)).await??
        };

        if files.is_empty() {
            return Err(format!("no readable source files found in '{source}'").into());
        }
        info!(source = %source, files = files.len(), "Crawled source files");
        ctx.put("crawler.files", files.len());

        Ok(GenerationContext {
            files,
            ..GenerationContext::new(source)
        })
    }
}

async fn clone(url: &str, target: &Path) -> Result<(), BoxError> {
    info!(url, path = %target.display(), "Cloning git repository");
    let status = Command::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg(url)
        .arg(target)
        .status()
        .await
        .map_err(|e| format!("failed to launch git: {e}"))?;
    if !status.success() {
        return Err(format!("git clone of '{url}' exited with {status}").into());
    }
    Ok(())
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn relative_display(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_files(
    root: &Path,
    max_files: usize,
    max_bytes: u64,
) -> Result<Vec<SourceFile>, std::io::Error> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if files.len() >= max_files {
            warn!(max_files, "File limit reached, ignoring remaining files");
            break;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
        if size > max_bytes {
            debug!(path = %entry.path().display(), size, "Skipping large file");
            continue;
        }
        match std::fs::read_to_string(entry.path()) {
            Ok(content) => {
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                files.push(SourceFile {
                    path: relative_display(relative),
                    content,
                });
            }
            Err(e) => debug!(path = %entry.path().display(), error = %e, "Skipping unreadable file"),
        }
    }
    Ok(files)
}
