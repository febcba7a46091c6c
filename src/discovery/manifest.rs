//! Project manifest (sitekit.yaml) parsing.
//!
//! The manifest describes the source/output layout and the tuning knobs of
//! each build step. Every field is optional; an empty manifest reproduces
//! the conventional `source/` → `build/` layout.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteError};

/// Project manifest loaded from sitekit.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Source tree root, relative to the project root.
    pub source: PathBuf,

    /// Output tree root, relative to the project root.
    pub output: PathBuf,

    /// Style compilation settings.
    pub styles: StylesConfig,

    /// Glob (relative to the source root) selecting markup files.
    pub markup: String,

    /// Image, WebP and sprite settings.
    pub images: ImagesConfig,

    /// Dev server settings.
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Entry style sheet, relative to the source root.
    pub entry: PathBuf,

    /// Glob (relative to the source root) whose changes recompile styles.
    pub watch: String,

    /// Directory for compiled CSS, relative to the output root.
    pub dir: PathBuf,

    /// Browserslist queries used for vendor prefixing.
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Image directory, relative to both the source and the output root.
    pub dir: PathBuf,

    /// Icon directory, relative to the image directory.
    pub icons: PathBuf,

    /// Sprite file name, written into the output image directory.
    pub sprite: String,

    /// oxipng optimization preset (0-6).
    pub png_level: u8,

    /// Progressive JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// WebP quality (1-100).
    pub webp_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            source: PathBuf::from("source"),
            output: PathBuf::from("build"),
            styles: StylesConfig::default(),
            markup: "*.html".to_string(),
            images: ImagesConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("sass/style.scss"),
            watch: "sass/**/*.scss".to_string(),
            dir: PathBuf::from("css"),
            targets: vec!["defaults".to_string()],
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("img"),
            icons: PathBuf::from("icons"),
            sprite: "sprite.svg".to_string(),
            png_level: 3,
            jpeg_quality: 75,
            webp_quality: 90,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// A `..` that would climb above the start of a relative path is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Whether one tree lies inside the other (or they are the same tree).
pub fn trees_overlap(a: &Path, b: &Path) -> bool {
    let (a, b) = (normalize_path(a), normalize_path(b));
    a.starts_with(&b) || b.starts_with(&a)
}

impl Manifest {
    /// Load manifest from a sitekit.yaml file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SiteError::io(path, "Failed to read manifest", e))?;

        Self::parse(&content)
    }

    /// Parse manifest from YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        // serde_yaml rejects an empty document for a struct
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let manifest: Self = serde_yaml::from_str(content).map_err(|e| SiteError::Config {
            message: format!("Invalid manifest: {}", e),
            help: Some("Check sitekit.yaml syntax".to_string()),
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject layouts that would let a build touch its own sources, and
    /// values the encoders cannot accept.
    pub fn validate(&self) -> Result<()> {
        // Only `..` left after normalizing means the output is the project
        // root or one of its ancestors.
        let output = normalize_path(&self.output);
        let contains_root = output.components().all(|c| c == Component::ParentDir);
        if contains_root || trees_overlap(&self.source, &self.output) {
            return Err(SiteError::Config {
                message: format!(
                    "output {} overlaps source {}",
                    self.output.display(),
                    self.source.display()
                ),
                help: Some(
                    "The output directory is deleted on every build; point it outside the source tree"
                        .to_string(),
                ),
            });
        }

        let images = &self.images;

        if images.png_level > 6 {
            return Err(SiteError::Config {
                message: format!("images.png_level must be 0-6, got {}", images.png_level),
                help: Some("oxipng presets range from 0 (fast) to 6 (slowest)".to_string()),
            });
        }

        for (key, value) in [
            ("images.jpeg_quality", images.jpeg_quality),
            ("images.webp_quality", images.webp_quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(SiteError::Config {
                    message: format!("{} must be 1-100, got {}", key, value),
                    help: None,
                });
            }
        }

        for (key, pattern) in [("markup", &self.markup), ("styles.watch", &self.styles.watch)] {
            glob::Pattern::new(pattern).map_err(|e| SiteError::Config {
                message: format!("{} is not a valid glob: {}", key, e),
                help: Some("Patterns are relative to the source directory, e.g. \"*.html\"".to_string()),
            })?;
        }

        if self.images.sprite.contains('/') {
            return Err(SiteError::Config {
                message: format!("images.sprite must be a file name, got {}", self.images.sprite),
                help: None,
            });
        }

        Ok(())
    }

    /// Render the manifest as YAML (used by `sitekit init`).
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| SiteError::Config {
            message: format!("Failed to serialize manifest: {}", e),
            help: None,
        })
    }
}
