//! Directory scanning for candidate documents.
//!
//! Walks the target directory and returns every file whose extension is
//! listed in `[scan].extensions`, pruning directories named in
//! `[scan].ignore_dirs` at any depth (build output, dependencies, VCS
//! metadata). Paths come back relative to the root and sorted, so runs are
//! reproducible and the relative path can double as the document key.
//!
//! ```text
//! site/
//! ├── index.html              ✓
//! ├── blog/post.html          ✓
//! ├── src/Hero.tsx            ✓
//! ├── styles.css              ✗ extension
//! └── node_modules/x/a.html   ✗ ignored directory
//! ```

use crate::config::ScanConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Target is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Kind of document, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    /// JSX/TSX and anything else that is markup-in-code.
    Component,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") => {
                DocumentKind::Html
            }
            _ => DocumentKind::Component,
        }
    }
}

/// A file selected for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the scan root.
    pub relative_path: PathBuf,
    pub kind: DocumentKind,
}

impl ScannedFile {
    /// Relative path with `/` separators, stable across platforms.
    pub fn document_key(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Find all candidate files under `root`.
pub fn scan(root: &Path, config: &ScanConfig) -> Result<Vec<ScannedFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_ignored_dir(entry, &config.ignore_dirs));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), &config.extensions) {
            continue;
        }
        let relative_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(ScannedFile {
            kind: DocumentKind::from_path(&relative_path),
            relative_path,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn is_ignored_dir(entry: &DirEntry, ignore_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ignore_dirs.iter().any(|ignored| ignored == name))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}
