//! Directory listing for picking files to import.

use serde::Serialize;
use std::path::{Component, Path};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Contents of one directory.
#[derive(Debug, Serialize)]
pub struct PathContents {
    pub path: String,
    /// `path` split into its components, root first.
    pub path_parts: Vec<String>,
    /// Files first, then directories; each group sorted ignoring case.
    pub elements: Vec<Element>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub name: String,
    pub is_directory: bool,
    /// Seconds since the Unix epoch, when readable.
    pub last_modified: Option<f64>,
}

/// List `path` (the current directory for `.`). Hidden entries, whose names
/// start with `.` or `$`, are skipped. An unreadable directory lists as empty.
pub fn path_contents(path: &Path) -> PathContents {
    let path = if path == Path::new(".") {
        std::env::current_dir().unwrap_or_else(|_| path.to_path_buf())
    } else {
        path.to_path_buf()
    };

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in WalkDir::new(&path)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        let element = Element {
            last_modified: last_modified(&entry),
            // Follows symlinks, so a link to a directory lists as one.
            is_directory: entry.path().is_dir(),
            name,
        };
        if element.is_directory {
            dirs.push(element);
        } else {
            files.push(element);
        }
    }
    files.sort_by_cached_key(|e| e.name.to_lowercase());
    dirs.sort_by_cached_key(|e| e.name.to_lowercase());
    files.extend(dirs);

    PathContents {
        path: path.to_string_lossy().into_owned(),
        path_parts: path_parts(&path),
        elements: files,
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('$')
}

fn last_modified(entry: &walkdir::DirEntry) -> Option<f64> {
    let modified = entry.metadata().ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs_f64())
}

fn path_parts(path: &Path) -> Vec<String> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}
