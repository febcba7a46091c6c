//! Image optimization.
//!
//! Every PNG, JPEG and SVG under the source image directory is re-encoded
//! into the output image directory: PNGs losslessly with oxipng, JPEGs as
//! progressive mozjpeg, SVGs by stripping editor and document cruft.
//! An encoding that does not shrink the file is discarded in favour of the
//! original bytes, so optimization never inflates an image.

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use rayon::prelude::*;

use crate::discovery::{scan_images, ImageKind, ImagesConfig};
use crate::error::{Result, SiteError};

use super::svg::Whitespace;
use super::{read_input, write_output, StepContext, StepReport};

/// Namespace prefixes of editor-private markup.
const EDITOR_PREFIXES: &[&str] = &["inkscape", "sodipodi", "sketch", "serif"];

fn image_error(path: &Path, message: impl std::fmt::Display) -> SiteError {
    SiteError::Image {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Keep whichever of the two encodings is smaller.
fn smallest<'a>(original: &'a [u8], optimized: Vec<u8>) -> Cow<'a, [u8]> {
    if optimized.len() < original.len() {
        Cow::Owned(optimized)
    } else {
        Cow::Borrowed(original)
    }
}

/// Lossless PNG recompression at the given oxipng preset.
pub fn optimize_png(data: &[u8], level: u8, path: &Path) -> Result<Vec<u8>> {
    let options = oxipng::Options::from_preset(level);
    oxipng::optimize_from_memory(data, &options).map_err(|e| image_error(path, e))
}

/// Progressive JPEG re-encoding.
pub fn optimize_jpeg(data: &[u8], quality: u8, path: &Path) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| image_error(path, e))?
        .to_rgb8();
    let (width, height) = image.dimensions();

    // libjpeg reports fatal errors by unwinding
    catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
        let mut compress = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        compress.set_size(width as usize, height as usize);
        compress.set_quality(f32::from(quality));
        compress.set_progressive_mode();

        let mut started = compress.start_compress(Vec::new())?;
        started.write_scanlines(image.as_raw())?;
        started.finish()
    }))
    .map_err(|_| image_error(path, "JPEG encoder aborted"))?
    .map_err(|e| image_error(path, e))
}

fn is_editor_name(name: &[u8]) -> bool {
    let name = String::from_utf8_lossy(name);
    let prefix = match name.split_once(':') {
        Some(("xmlns", prefix)) => prefix,
        Some((prefix, _)) => prefix,
        None => return false,
    };
    EDITOR_PREFIXES.contains(&prefix)
}

/// Copy an element start tag without editor-private attributes.
fn strip_editor_attributes(element: &BytesStart<'_>, path: &Path) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut cleaned = BytesStart::new(name);

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| image_error(path, e))?;
        if !is_editor_name(attribute.key.as_ref()) {
            cleaned.push_attribute(attribute);
        }
    }

    Ok(cleaned.into_owned())
}

/// Structural SVG optimization.
///
/// Drops the XML declaration, doctype, comments, processing instructions,
/// `<metadata>` blocks, editor-namespaced elements and attributes, and
/// whitespace-only text between elements. Whitespace inside text content
/// or under `xml:space="preserve"` is kept.
pub fn optimize_svg(source: &str, path: &Path) -> Result<Vec<u8>> {
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::new());
    let mut whitespace = Whitespace::default();
    // Depth inside an element being dropped; zero when copying.
    let mut skipping = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| image_error(path, e))?;

        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        let drop_element = |e: &BytesStart<'_>| {
            let name = e.name();
            name.as_ref() == b"metadata" || is_editor_name(name.as_ref())
        };

        let output = match event {
            Event::Eof => break,
            Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => None,
            Event::Start(e) if drop_element(&e) => {
                skipping = 1;
                None
            }
            Event::Empty(e) if drop_element(&e) => None,
            Event::Start(e) => {
                whitespace.enter(&e);
                Some(Event::Start(strip_editor_attributes(&e, path)?))
            }
            Event::Empty(e) => Some(Event::Empty(strip_editor_attributes(&e, path)?)),
            Event::End(e) => {
                whitespace.leave();
                Some(Event::End(e))
            }
            Event::Text(text) if whitespace.is_droppable(&text) => None,
            other => Some(other),
        };

        if let Some(event) = output {
            writer
                .write_event(event)
                .map_err(|e| image_error(path, e))?;
        }
    }

    Ok(writer.into_inner())
}

/// Optimize one image according to its kind, never returning more bytes
/// than it was given.
pub fn optimize_image(
    data: &[u8],
    kind: ImageKind,
    config: &ImagesConfig,
    path: &Path,
) -> Result<Vec<u8>> {
    let optimized = match kind {
        ImageKind::Png => optimize_png(data, config.png_level, path)?,
        ImageKind::Jpeg => optimize_jpeg(data, config.jpeg_quality, path)?,
        ImageKind::Svg => {
            let source = std::str::from_utf8(data).map_err(|e| image_error(path, e))?;
            optimize_svg(source, path)?
        }
    };

    Ok(smallest(data, optimized).into_owned())
}

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport> {
    let project = ctx.project;
    let source_dir = project.source_images_dir();
    let build_dir = project.build_images_dir();
    let config = &project.manifest.images;

    let images = scan_images(&source_dir, |_| true)?;

    let outputs = images
        .par_iter()
        .map(|(path, kind)| -> Result<PathBuf> {
            let data = read_input(path)?;
            let optimized = optimize_image(&data, *kind, config, path)?;

            let relative = path.strip_prefix(&source_dir).unwrap_or(path);
            let target = build_dir.join(relative);
            write_output(&target, optimized)?;

            tracing::debug!(
                image = %relative.display(),
                before = data.len(),
                "optimized"
            );
            Ok(target)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StepReport::new(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Manifest, Project};
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
        })
    }

    fn encode(image: &RgbImage, format: image::ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_png_never_grows() {
        let png = encode(&gradient(64, 64), image::ImageFormat::Png);
        let config = ImagesConfig::default();

        let optimized = optimize_image(&png, ImageKind::Png, &config, Path::new("a.png")).unwrap();

        assert!(optimized.len() <= png.len());
        let decoded = image::load_from_memory(&optimized).unwrap().to_rgb8();
        assert_eq!(decoded, gradient(64, 64));
    }

    #[test]
    fn test_jpeg_is_progressive_and_decodable() {
        let jpeg = encode(&gradient(48, 32), image::ImageFormat::Jpeg);

        let reencoded = optimize_jpeg(&jpeg, 75, Path::new("photo.jpg")).unwrap();
        let decoded = image::load_from_memory(&reencoded).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (48, 32));
        // SOF2 marks a progressive frame
        assert!(reencoded.windows(2).any(|w| w == [0xFF, 0xC2]));
    }

    #[test]
    fn test_corrupt_jpeg_is_an_image_error() {
        let err = optimize_jpeg(b"not a jpeg", 75, Path::new("broken.jpg")).unwrap_err();
        assert!(matches!(err, SiteError::Image { .. }));
    }

    #[test]
    fn test_optimize_svg_strips_cruft() {
        let source = r##"<?xml version="1.0" encoding="UTF-8"?>
<!-- Generator: Inkscape -->
<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" viewBox="0 0 24 24" inkscape:version="1.2">
  <metadata>
    <rdf:RDF><cc:Work/></rdf:RDF>
  </metadata>
  <sodipodi:namedview id="base"/>
  <path d="M0 0h24v24H0z" fill="#000"/>
</svg>
"##;

        let out = String::from_utf8(optimize_svg(source, Path::new("a.svg")).unwrap()).unwrap();

        assert_eq!(
            out,
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M0 0h24v24H0z" fill="#000"/></svg>"##
        );
    }

    #[test]
    fn test_optimize_svg_keeps_text_content() {
        let source = "<svg><text x=\"0\">Hello world</text></svg>";
        let out = String::from_utf8(optimize_svg(source, Path::new("t.svg")).unwrap()).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_optimize_svg_keeps_space_between_tspans() {
        let source = "<svg>\n  <text x=\"0\"><tspan>Hello</tspan> <tspan>world</tspan></text>\n</svg>";
        let out = String::from_utf8(optimize_svg(source, Path::new("t.svg")).unwrap()).unwrap();
        assert_eq!(
            out,
            "<svg><text x=\"0\"><tspan>Hello</tspan> <tspan>world</tspan></text></svg>"
        );
    }

    #[test]
    fn test_optimize_svg_honours_xml_space_preserve() {
        let source = "<svg>\n  <g xml:space=\"preserve\"> <path/> </g>\n</svg>";
        let out = String::from_utf8(optimize_svg(source, Path::new("p.svg")).unwrap()).unwrap();
        assert_eq!(out, "<svg><g xml:space=\"preserve\"> <path/> </g></svg>");
    }

    #[test]
    fn test_already_minimal_svg_is_kept() {
        let source = b"<svg/>".to_vec();
        let config = ImagesConfig::default();

        let out = optimize_image(&source, ImageKind::Svg, &config, Path::new("a.svg")).unwrap();

        assert_eq!(out, source);
    }

    #[test]
    fn test_run_mirrors_relative_paths() {
        let dir = tempdir().unwrap();
        let project = Project::new(dir.path(), Manifest::default());
        let img = project.source_images_dir();
        fs::create_dir_all(img.join("icons")).unwrap();
        fs::write(img.join("logo.png"), encode(&gradient(16, 16), image::ImageFormat::Png)).unwrap();
        fs::write(img.join("icons/arrow.svg"), "<svg>\n  <path d=\"M0 0\"/>\n</svg>\n").unwrap();
        fs::write(img.join("notes.txt"), "skip me").unwrap();

        let report = run(&StepContext::new(&project)).unwrap();

        assert_eq!(report.len(), 2);
        let out = project.build_images_dir();
        assert!(out.join("logo.png").exists());
        assert_eq!(
            fs::read_to_string(out.join("icons/arrow.svg")).unwrap(),
            "<svg><path d=\"M0 0\"/></svg>"
        );
        assert!(!out.join("notes.txt").exists());
    }

    #[test]
    fn test_run_without_images_dir() {
        let dir = tempdir().unwrap();
        let project = Project::new(dir.path(), Manifest::default());

        let report = run(&StepContext::new(&project)).unwrap();

        assert!(report.is_empty());
    }
}
