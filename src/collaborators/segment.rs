use image::{GrayImage, RgbImage};
use std::path::PathBuf;

use super::{CollabFuture, Segmenter};
use crate::error::CoreError;
use crate::regions::load_mask;

/// Reads masks a segmentation model already wrote as `<dir>/<name>_mask.png`.
#[derive(Debug, Clone)]
pub struct MaskFileSegmenter {
    dir: PathBuf,
}

impl MaskFileSegmenter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn mask_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_mask.png", name))
    }
}

impl Segmenter for MaskFileSegmenter {
    fn segment<'a>(&'a self, name: &'a str, image: &'a RgbImage) -> CollabFuture<'a, GrayImage> {
        Box::pin(async move {
            let path = self.mask_path(name);
            if !path.exists() {
                return Err(CoreError::collaborator(format!(
                    "no segmentation mask for page '{}' at {}",
                    name,
                    path.display()
                )));
            }
            let mask = load_mask(&path)?;
            if mask.dimensions() != image.dimensions() {
                return Err(CoreError::input(format!(
                    "mask {}x{} does not match page {}x{}",
                    mask.width(),
                    mask.height(),
                    image.width(),
                    image.height()
                )));
            }
            Ok(mask)
        })
    }
}
