//! Seams to the external models the pipeline drives.

use image::{GrayImage, RgbImage};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::error::CoreError;
use crate::regions::RegionList;

mod inpaint;
mod segment;
mod tesseract;

pub use inpaint::{CommandInpainter, CopyInpainter};
pub use segment::MaskFileSegmenter;
pub use tesseract::{TesseractRecognizer, ocr_crop_rect};

pub type CollabFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CoreError>> + Send + 'a>>;

/// Produces a binary text mask for a page.
pub trait Segmenter: Send + Sync {
    fn segment<'a>(&'a self, name: &'a str, image: &'a RgbImage) -> CollabFuture<'a, GrayImage>;
}

/// Reads the text inside each region, index-aligned with `regions`.
pub trait TextRecognizer: Send + Sync {
    fn recognize<'a>(
        &'a self,
        image: &'a RgbImage,
        regions: &'a RegionList,
    ) -> CollabFuture<'a, Vec<String>>;
}

/// Surrounding text handed to the translation backend with each region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationContext {
    /// All recognized text of the page, one region per line.
    pub page_text: String,
    /// Earlier `(source, translation)` pairs of the same page.
    pub prior: Vec<(String, String)>,
}

impl TranslationContext {
    pub fn for_page(texts: &[String]) -> Self {
        let page_text = texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            page_text,
            prior: Vec::new(),
        }
    }

    pub fn remember(&mut self, source: &str, translation: &str) {
        self.prior.push((source.to_string(), translation.to_string()));
    }
}

pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &str;

    fn translate<'a>(
        &'a self,
        text: &'a str,
        target_lang: &'a str,
        context: &'a TranslationContext,
    ) -> CollabFuture<'a, String>;
}

/// Inpaints every `<name>/<name>.png` under `input_dir` using its
/// `<name>_mask.png`, writing `<name>/<name>_mask.png` under `output_dir`.
pub trait Inpainter: Send + Sync {
    fn inpaint<'a>(&'a self, input_dir: &'a Path, output_dir: &'a Path) -> CollabFuture<'a, ()>;
}
