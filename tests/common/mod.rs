//! Shared fixture for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use walkdir::WalkDir;

pub const ARROW_SVG: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="24" height="24">
  <path d="M4 12h14m-6-6 6 6-6 6" fill="#000" stroke="#000"/>
</svg>
"##;

pub const CLOSE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
  <path d="M6 6l12 12M18 6L6 18" stroke="currentColor"/>
</svg>
"##;

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Home</title>
    <link rel="stylesheet" href="css/style.min.css">
  </head>
  <body>
    <h1>
      Hello,   world
    </h1>
  </body>
</html>
"#;

fn gradient(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 3 % 256) as u8, (y * 2 % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// A small site: styles importing a partial, one page, a photo, a logo
/// and two icons.
pub fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");

    write(&source.join("sass/_variables.scss"), "$accent: #c0392b;\n");
    write(
        &source.join("sass/style.scss"),
        "@import \"variables\";\n\n.button {\n  color: $accent;\n  display: flex;\n}\n",
    );
    write(&source.join("index.html"), INDEX_HTML);
    write(&source.join("img/icons/arrow.svg"), ARROW_SVG);
    write(&source.join("img/icons/close.svg"), CLOSE_SVG);
    write(&source.join("img/photo.jpg"), encode(&gradient(96, 64), ImageFormat::Jpeg));
    write(&source.join("img/logo.png"), encode(&gradient(48, 48), ImageFormat::Png));

    dir
}

pub fn write(path: &Path, contents: impl AsRef<[u8]>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Replace a file's contents in one rename, so watchers never see it half written.
pub fn replace(path: &Path, contents: &str) {
    let staging = path.with_extension("tmp");
    fs::write(&staging, contents).unwrap();
    fs::rename(&staging, path).unwrap();
}

/// Every file below `root`, keyed by relative path.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}
