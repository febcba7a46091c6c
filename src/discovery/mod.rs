//! Project discovery and layout resolution.
//!
//! A project is a root directory plus an optional `sitekit.yaml` manifest.
//! [`Project`] turns the manifest's relative settings into the concrete
//! source and output paths every build step reads and writes.
//!
//! # Example
//!
//! ```ignore
//! use sitekit::discovery::discover;
//!
//! let project = discover("./my-site")?;
//! println!("Building into {}", project.build_dir().display());
//! ```

mod manifest;
mod scanner;

use std::path::{Path, PathBuf};

use crate::error::{Result, SiteError};

pub use manifest::{normalize_path, trees_overlap, ImagesConfig, Manifest, ServerConfig, StylesConfig};
pub use scanner::{detect_image_kind, matches_glob, scan_glob, scan_images, ImageKind, MATCH_OPTIONS};

/// The name of the manifest file.
pub const MANIFEST_FILENAME: &str = "sitekit.yaml";

/// A project root with its resolved configuration.
#[derive(Debug, Clone)]
pub struct Project {
    /// The project root directory.
    pub root: PathBuf,

    /// The loaded manifest (default if no sitekit.yaml found).
    pub manifest: Manifest,

    /// Whether a sitekit.yaml manifest was found.
    pub has_manifest: bool,
}

impl Project {
    /// Create a project from an explicit manifest.
    pub fn new(root: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Self {
            root: root.into(),
            manifest,
            has_manifest: false,
        }
    }

    /// Source tree root.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.manifest.source)
    }

    /// Output tree root.
    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.manifest.output)
    }

    /// Entry style sheet.
    pub fn style_entry(&self) -> PathBuf {
        self.source_dir().join(&self.manifest.styles.entry)
    }

    /// Directory that receives compiled CSS.
    pub fn css_dir(&self) -> PathBuf {
        self.build_dir().join(&self.manifest.styles.dir)
    }

    /// Raw images in the source tree.
    pub fn source_images_dir(&self) -> PathBuf {
        self.source_dir().join(&self.manifest.images.dir)
    }

    /// Optimized images in the output tree.
    pub fn build_images_dir(&self) -> PathBuf {
        self.build_dir().join(&self.manifest.images.dir)
    }

    /// Optimized icons the sprite is assembled from.
    pub fn build_icons_dir(&self) -> PathBuf {
        self.build_images_dir().join(&self.manifest.images.icons)
    }

    /// Generated sprite sheet.
    pub fn sprite_path(&self) -> PathBuf {
        self.build_images_dir().join(&self.manifest.images.sprite)
    }

    /// Fail unless the output tree lies entirely outside the source tree.
    ///
    /// Paths are resolved against the canonical project root, which also
    /// catches absolute or `..` settings the manifest alone cannot judge.
    pub fn check_layout(&self) -> Result<()> {
        let root = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let source = root.join(&self.manifest.source);
        let output = root.join(&self.manifest.output);

        if trees_overlap(&source, &output) {
            return Err(SiteError::Config {
                message: format!(
                    "output {} overlaps source {}",
                    normalize_path(&output).display(),
                    normalize_path(&source).display()
                ),
                help: Some("Point output outside the source tree in sitekit.yaml".to_string()),
            });
        }
        Ok(())
    }

    /// Path relative to the output root, with forward slashes (URL form).
    pub fn url_path(&self, path: &Path) -> String {
        let build = self.build_dir();
        let relative = path.strip_prefix(&build).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Discover a project in a directory.
///
/// Loads `sitekit.yaml` from the root if present; otherwise the default
/// layout is used.
pub fn discover(root: impl AsRef<Path>) -> Result<Project> {
    let root = root.as_ref().to_path_buf();

    let manifest_path = root.join(MANIFEST_FILENAME);
    let (manifest, has_manifest) = if manifest_path.exists() {
        (Manifest::load(&manifest_path)?, true)
    } else {
        (Manifest::default(), false)
    };

    Ok(Project {
        root,
        manifest,
        has_manifest,
    })
}
