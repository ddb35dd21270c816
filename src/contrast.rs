use image::{GenericImageView, Pixel, RgbImage, imageops};

use crate::error::CoreError;
use crate::geometry::Rect;

const MID_LUMINANCE: f64 = 255.0 / 2.0;

/// Ink colour for rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Light,
    Dark,
}

impl Ink {
    pub fn value(self) -> u8 {
        match self {
            Ink::Light => 255,
            Ink::Dark => 0,
        }
    }

    pub fn to_hex(self) -> &'static str {
        match self {
            Ink::Light => "#ffffff",
            Ink::Dark => "#000000",
        }
    }
}

/// Light ink over dark backgrounds, dark ink otherwise, judged on the mean of
/// the first channel.
pub fn pick_ink<I, P>(crop: &I) -> Result<Ink, CoreError>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = crop.dimensions();
    if width == 0 || height == 0 {
        return Err(CoreError::input("cannot pick ink for an empty crop"));
    }
    let sum: u64 = crop
        .pixels()
        .map(|(_, _, pixel)| pixel.channels()[0] as u64)
        .sum();
    let mean = sum as f64 / (width as u64 * height as u64) as f64;
    Ok(if mean < MID_LUMINANCE {
        Ink::Light
    } else {
        Ink::Dark
    })
}

/// Picks ink from the part of `region` that lies inside `source`.
pub fn ink_for_region(source: &RgbImage, region: &Rect) -> Result<Ink, CoreError> {
    let (width, height) = source.dimensions();
    let rect = region.clamp_to(width, height).ok_or_else(|| {
        CoreError::input(format!(
            "region {:?} lies outside the {}x{} source image",
            region, width, height
        ))
    })?;
    let crop = imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image();
    pick_ink(&crop)
}
