use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use super::RegionList;
use crate::error::CoreError;
use crate::geometry::Rect;

/// Chebyshev radius of the 5×5 all-ones structuring element.
const DILATION_RADIUS: u8 = 2;

/// Reads a mask file; only single-channel images are accepted.
pub fn load_mask(path: &Path) -> Result<GrayImage, CoreError> {
    let image = image::open(path).map_err(|err| {
        CoreError::input(format!("failed to read mask {}: {}", path.display(), err))
    })?;
    match image {
        DynamicImage::ImageLuma8(mask) => Ok(mask),
        DynamicImage::ImageLuma16(_) => Ok(image.to_luma8()),
        other => Err(CoreError::input(format!(
            "mask {} is not single-channel ({:?})",
            path.display(),
            other.color()
        ))),
    }
}

pub fn save_mask(mask: &GrayImage, path: &Path) -> Result<(), CoreError> {
    mask.save(path).map_err(|err| {
        CoreError::input(format!("failed to write mask {}: {}", path.display(), err))
    })
}

/// Grows foreground with a 5×5 square, `iterations` times.
pub fn dilate(mask: &mut GrayImage, iterations: u32) {
    for _ in 0..iterations {
        *mask = morphology::dilate(mask, Norm::LInf, DILATION_RADIUS);
    }
}

/// Dilates `mask` in place, then returns the bounding box of every
/// 8-connected foreground blob in raster discovery order.
pub fn extract(mask: &mut GrayImage, dilation_iterations: u32) -> RegionList {
    dilate(mask, dilation_iterations);
    let foreground = binarize(mask);
    let labels = connected_components(&foreground, Connectivity::Eight, Luma([0u8]));
    let regions = bounding_boxes(&labels);
    debug!(
        "extracted {} region(s) after {} dilation iteration(s)",
        regions.len(),
        dilation_iterations
    );
    regions
}

/// Loads the mask at `path`, extracts regions and writes the dilated mask back.
pub fn extract_file(path: &Path, dilation_iterations: u32) -> Result<RegionList, CoreError> {
    let mut mask = load_mask(path)?;
    let regions = extract(&mut mask, dilation_iterations);
    save_mask(&mask, path)?;
    Ok(regions)
}

// Labeling treats differing non-zero values as separate components, so the
// mask is flattened to 0/255 first.
fn binarize(mask: &GrayImage) -> GrayImage {
    let mut output = mask.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = if pixel[0] > 0 { 255 } else { 0 };
    }
    output
}

fn bounding_boxes(labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> RegionList {
    let count = labels.pixels().map(|pixel| pixel[0]).max().unwrap_or(0) as usize;
    let mut bounds: Vec<Option<(u32, u32, u32, u32)>> = vec![None; count + 1];

    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0] as usize;
        if label == 0 {
            continue;
        }
        let entry = bounds[label].get_or_insert((x, y, x, y));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
    }

    bounds
        .into_iter()
        .skip(1)
        .flatten()
        .map(|(x1, y1, x2, y2)| Rect::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1))
        .collect::<Vec<_>>()
        .into()
}
