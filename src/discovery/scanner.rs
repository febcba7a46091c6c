//! File system scanner for build inputs.
//!
//! Walks a directory and selects files either by a glob relative to the
//! walked root (`*.html`, `sass/**/*.scss`) or by image extension.
//! Results are always sorted so every step sees files in a stable order.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{Result, SiteError};

/// Image formats the pipeline knows how to re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Png,
    Jpeg,
    Svg,
}

impl ImageKind {
    /// Raster formats are the ones that get a WebP derivative.
    pub fn is_raster(self) -> bool {
        matches!(self, ImageKind::Png | ImageKind::Jpeg)
    }
}

/// Glob options: `*` never crosses a directory boundary, so `*.html`
/// only selects top-level files while `**` still recurses.
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Detect the image kind from a file path based on its extension.
pub fn detect_image_kind(path: &Path) -> Option<ImageKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    match ext.as_str() {
        "png" => Some(ImageKind::Png),
        "jpg" | "jpeg" => Some(ImageKind::Jpeg),
        "svg" => Some(ImageKind::Svg),
        _ => None,
    }
}

/// Check whether `path` (below `root`) matches a root-relative glob.
pub fn matches_glob(root: &Path, path: &Path, pattern: &Pattern) -> bool {
    match path.strip_prefix(root) {
        Ok(relative) => pattern.matches_path_with(relative, MATCH_OPTIONS),
        Err(_) => false,
    }
}

/// Collect every file below `root` whose root-relative path matches `pattern`.
///
/// A missing root yields no files.
pub fn scan_glob(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern).map_err(|e| SiteError::Config {
        message: format!("Invalid glob {}: {}", pattern, e),
        help: None,
    })?;

    let mut files = walk_files(root)?;
    files.retain(|path| matches_glob(root, path, &pattern));
    Ok(files)
}

/// Collect every image below `root` whose kind is accepted by `filter`.
pub fn scan_images(
    root: &Path,
    filter: impl Fn(ImageKind) -> bool,
) -> Result<Vec<(PathBuf, ImageKind)>> {
    let files = walk_files(root)?;

    Ok(files
        .into_iter()
        .filter_map(|path| {
            let kind = detect_image_kind(&path)?;
            filter(kind).then_some((path, kind))
        })
        .collect())
}

/// Recursively list the regular files under `root`, sorted.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| SiteError::Io {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            message: format!("Failed to scan directory: {}", e),
        })?;

        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
