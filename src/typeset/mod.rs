//! Fitting translated text into regions and drawing it onto pages.

pub mod fit;
pub mod font;
pub mod inject;
pub mod place;
pub mod render;

use image::RgbImage;

use crate::error::CoreError;
use crate::regions::RegionList;

pub use fit::{FitResult, MIN_FONT_SIZE, SizeBounds, Wrap, block_height, fit};
pub use font::{EstimatedMetrics, FontMetrics, FontSpec, TextExtent, TextMeasure, TypesetFont};
pub use inject::{Injection, inject_page};
pub use place::{PlacedLine, layout_lines};
pub use render::{Rasterizer, TextLayer};

/// Families tried when no font file is configured.
pub const FALLBACK_FAMILIES: &[&str] = &["Noto Sans", "DejaVu Sans", "Liberation Sans", "sans-serif"];

/// A font, its size range and a rasterizer bound together for a batch.
pub struct Typesetter {
    measure: Box<dyn TextMeasure + Send + Sync>,
    rasterizer: Rasterizer,
    bounds: SizeBounds,
}

impl Typesetter {
    pub fn new(font: TypesetFont, min_size: u32) -> Self {
        let bounds = SizeBounds::new(min_size, font.initial_size());
        let rasterizer = Rasterizer::for_font(&font);
        Self {
            measure: Box::new(font),
            rasterizer,
            bounds,
        }
    }

    /// Width estimates and system fonts, for when no face could be loaded.
    pub fn estimated(initial_size: u32, min_size: u32) -> Self {
        Self {
            measure: Box::new(EstimatedMetrics),
            rasterizer: Rasterizer::system(),
            bounds: SizeBounds::new(min_size, initial_size),
        }
    }

    pub fn bounds(&self) -> SizeBounds {
        self.bounds
    }

    pub fn inject(
        &self,
        target: &mut RgbImage,
        source: &RgbImage,
        regions: &RegionList,
        texts: &[String],
    ) -> Result<Vec<Injection>, CoreError> {
        inject_page(
            target,
            source,
            regions,
            texts,
            self.measure.as_ref(),
            self.bounds,
            &self.rasterizer,
        )
    }
}
