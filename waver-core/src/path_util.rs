use std::io;
use std::path::{Path, PathBuf};

/// Derive a project name from a local path or repository URL.
///
/// Takes the last path component and strips exactly one trailing `.git`.
/// Returns `None` for blank input, for inputs without a final component
/// (e.g. `/`), and when nothing is left after stripping.
///
/// ```
/// use waver_core::path_util::folder_name;
///
/// assert_eq!(folder_name("https://host/user/repo.git").as_deref(), Some("repo"));
/// assert_eq!(folder_name("/path/to/project.git.git").as_deref(), Some("project.git"));
/// assert_eq!(folder_name("   "), None);
/// ```
pub fn folder_name(path: &str) -> Option<String> {
    if path.trim().is_empty() {
        return None;
    }
    let name = Path::new(path).file_name()?.to_string_lossy();
    let name = name.strip_suffix(".git").unwrap_or(&name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Resolve `path` against the current directory unless it is already absolute.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}
