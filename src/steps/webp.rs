//! WebP derivatives of optimized raster images.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use rayon::prelude::*;

use crate::discovery::{scan_images, ImageKind};
use crate::error::{Result, SiteError};

use super::{read_input, write_output, StepContext, StepReport};

/// Decode a raster image and encode it as lossy WebP.
pub fn encode_webp(data: &[u8], quality: u8, path: &Path) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(data).map_err(|e| SiteError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    // The encoder only accepts 8-bit RGB(A)
    let normalized = if decoded.color().has_alpha() {
        DynamicImage::ImageRgba8(decoded.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(decoded.to_rgb8())
    };

    let encoder = webp::Encoder::from_image(&normalized).map_err(|e| SiteError::Image {
        path: path.to_path_buf(),
        message: format!("WebP encoder rejected image: {}", e),
    })?;

    Ok(encoder.encode(f32::from(quality)).to_vec())
}

/// Sibling path with the extension replaced by `.webp`.
pub fn webp_path(path: &Path) -> PathBuf {
    path.with_extension("webp")
}

/// Map every raster to its WebP target, refusing two sources for one target.
fn plan_targets(rasters: Vec<PathBuf>) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut targets: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for source in rasters {
        let target = webp_path(&source);
        if let Some(previous) = targets.get(&target) {
            return Err(SiteError::Image {
                path: target.clone(),
                message: format!(
                    "both {} and {} would produce this file",
                    previous.display(),
                    source.display()
                ),
            });
        }
        targets.insert(target, source);
    }

    Ok(targets
        .into_iter()
        .map(|(target, source)| (source, target))
        .collect())
}

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport> {
    let project = ctx.project;
    let quality = project.manifest.images.webp_quality;

    let rasters = scan_images(&project.build_images_dir(), ImageKind::is_raster)?
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    let plan = plan_targets(rasters)?;

    let outputs = plan
        .par_iter()
        .map(|(source, target)| -> Result<PathBuf> {
            let data = read_input(source)?;
            write_output(target, encode_webp(&data, quality, source)?)?;
            Ok(target.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(StepReport::new(outputs))
}
