use image::{RgbImage, imageops};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::{CollabFuture, TextRecognizer};
use crate::error::CoreError;
use crate::geometry::Rect;
use crate::regions::RegionList;

pub const DEFAULT_CROP_PADDING: u32 = 15;

/// OCR through the `tesseract` command line tool, one call per region.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    languages: String,
    psm: u32,
    padding: u32,
}

impl TesseractRecognizer {
    pub fn new(languages: impl Into<String>, psm: u32) -> Self {
        Self {
            languages: languages.into(),
            psm,
            padding: DEFAULT_CROP_PADDING,
        }
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    async fn recognize_region(&self, image: &RgbImage, region: &Rect) -> Result<String, CoreError> {
        let (width, height) = image.dimensions();
        let Some(rect) = ocr_crop_rect(region, width, height, self.padding) else {
            return Ok(String::new());
        };
        let crop = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
        let file = tempfile::Builder::new()
            .prefix("mangaquick-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(CoreError::collaborator)?;
        crop.save(file.path())?;
        let raw = run_tesseract(file.path(), &self.languages, self.psm).await?;
        Ok(collapse_whitespace(&raw))
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize<'a>(
        &'a self,
        image: &'a RgbImage,
        regions: &'a RegionList,
    ) -> CollabFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut texts = Vec::with_capacity(regions.len());
            for region in regions {
                texts.push(self.recognize_region(image, region).await?);
            }
            debug!("recognized {} region(s)", texts.len());
            Ok(texts)
        })
    }
}

/// Crop used for OCR: `region` grown by `padding` on every side when the
/// grown box stays strictly inside the page, otherwise `region` clamped to it.
pub fn ocr_crop_rect(region: &Rect, width: u32, height: u32, padding: u32) -> Option<Rect> {
    let fits = region.x > padding
        && region.y > padding
        && region.right() + padding <= width
        && region.bottom() + padding <= height;
    if fits {
        return Some(Rect::new(
            region.x - padding,
            region.y - padding,
            region.width + padding * 2,
            region.height + padding * 2,
        ));
    }
    region.clamp_to(width, height)
}

async fn run_tesseract(path: &Path, languages: &str, psm: u32) -> Result<String, CoreError> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--psm")
        .arg(psm.to_string())
        .output()
        .await
        .map_err(|err| {
            CoreError::collaborator(format!("failed to run tesseract (is it installed?): {}", err))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoreError::collaborator(format!(
            "tesseract failed: {}",
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_applies_only_strictly_inside_the_page() {
        let inside = Rect::new(20, 20, 10, 10);
        assert_eq!(
            ocr_crop_rect(&inside, 100, 100, 15),
            Some(Rect::new(5, 5, 40, 40))
        );

        let touching_left = Rect::new(15, 20, 10, 10);
        assert_eq!(ocr_crop_rect(&touching_left, 100, 100, 15), Some(touching_left));

        let flush_bottom = Rect::new(20, 75, 10, 10);
        assert_eq!(
            ocr_crop_rect(&flush_bottom, 100, 100, 15),
            Some(Rect::new(5, 60, 40, 40))
        );
        let past_bottom = Rect::new(20, 76, 10, 10);
        assert_eq!(ocr_crop_rect(&past_bottom, 100, 100, 15), Some(past_bottom));
    }

    #[test]
    fn regions_off_the_page_have_no_crop() {
        assert_eq!(ocr_crop_rect(&Rect::new(200, 200, 5, 5), 100, 100, 15), None);
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace(" 今日は\n\n いい  天気 \n"), "今日は いい 天気");
    }
}
