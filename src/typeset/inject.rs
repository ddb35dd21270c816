use image::RgbImage;
use tracing::debug;

use super::fit::{FitResult, SizeBounds, Wrap, fit};
use super::font::TextMeasure;
use super::place::layout_lines;
use super::render::Rasterizer;
use crate::contrast::{Ink, ink_for_region};
use crate::error::CoreError;
use crate::geometry::Rect;
use crate::regions::RegionList;

/// What was drawn into one region.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub region: Rect,
    pub fit: FitResult,
    pub ink: Ink,
}

/// Fits, centres and draws `texts[i]` into `regions[i]` on `target`.
///
/// Ink is judged on `source`, the page before inpainting. Regions whose text
/// is blank are left untouched.
pub fn inject_page<M: TextMeasure + ?Sized>(
    target: &mut RgbImage,
    source: &RgbImage,
    regions: &RegionList,
    texts: &[String],
    font: &M,
    bounds: SizeBounds,
    rasterizer: &Rasterizer,
) -> Result<Vec<Injection>, CoreError> {
    if regions.len() != texts.len() {
        return Err(CoreError::input(format!(
            "{} region(s) but {} translation(s)",
            regions.len(),
            texts.len()
        )));
    }

    let mut layer = rasterizer.layer(target);
    let mut injections = Vec::new();
    for (region, text) in regions.iter().zip(texts) {
        if text.trim().is_empty() {
            continue;
        }
        let ink = ink_for_region(source, region)?;
        let fitted = fit(text, region, font, bounds);
        if fitted.wrap == Wrap::Forced {
            debug!("region {:?} needed forced breaks at {}px", region, fitted.font_size);
        }
        let placed = layout_lines(&fitted.lines, region, font, fitted.font_size);
        layer.push_lines(&placed, fitted.font_size, font.ascent(fitted.font_size), ink);
        injections.push(Injection {
            region: *region,
            fit: fitted,
            ink,
        });
    }

    rasterizer.draw(target, &layer)?;
    Ok(injections)
}
