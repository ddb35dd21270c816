use image::{Rgb, RgbImage};
use resvg::render;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree, fontdb};

use super::font::TypesetFont;
use super::place::PlacedLine;
use crate::contrast::Ink;
use crate::error::CoreError;

/// Draws placed lines onto page images through an SVG text layer.
pub struct Rasterizer {
    fontdb: Arc<fontdb::Database>,
    family: String,
}

impl Rasterizer {
    /// Uses the face of `font`, with system fonts for missing glyphs.
    pub fn for_font(font: &TypesetFont) -> Self {
        Self::with_font_data(Some(font.data()), font.family())
    }

    /// System fonts only.
    pub fn system() -> Self {
        Self::with_font_data(None, "sans-serif")
    }

    fn with_font_data(font_data: Option<&[u8]>, family: &str) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        if let Some(data) = font_data {
            db.load_font_data(data.to_vec());
        }
        Self {
            fontdb: Arc::new(db),
            family: family.to_string(),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Starts an empty text layer the size of `target`.
    pub fn layer(&self, target: &RgbImage) -> TextLayer {
        let (width, height) = target.dimensions();
        TextLayer {
            width,
            height,
            body: String::new(),
            family: escape_xml(&self.family),
        }
    }

    /// Renders `layer` and composites it over `target`.
    pub fn draw(&self, target: &mut RgbImage, layer: &TextLayer) -> Result<(), CoreError> {
        if layer.is_empty() {
            return Ok(());
        }
        let options = Options {
            fontdb: self.fontdb.clone(),
            font_family: self.family.clone(),
            ..Options::default()
        };
        let svg = layer.to_svg();
        let tree = Tree::from_str(&svg, &options)
            .map_err(|err| CoreError::input(format!("failed to parse text layer: {}", err)))?;
        let mut pixmap = Pixmap::new(layer.width, layer.height)
            .ok_or_else(|| CoreError::input("cannot draw text on an empty image"))?;
        let mut pixmap_mut = pixmap.as_mut();
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
        composite(target, &pixmap);
        debug!("drew text layer of {} bytes", svg.len());
        Ok(())
    }
}

/// Text elements accumulated for one page.
pub struct TextLayer {
    width: u32,
    height: u32,
    body: String,
    family: String,
}

impl TextLayer {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Adds `lines` with their baselines `ascent` below each line top.
    pub fn push_lines(&mut self, lines: &[PlacedLine], size: u32, ascent: f32, ink: Ink) {
        for line in lines {
            if line.text.trim().is_empty() {
                continue;
            }
            self.body.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{color}" xml:space="preserve">{text}</text>"#,
                x = line.x,
                y = line.y + ascent,
                size = size,
                family = self.family,
                color = ink.to_hex(),
                text = escape_xml(&line.text)
            ));
        }
    }

    fn to_svg(&self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">{body}</svg>"#,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

// Pixmap data is premultiplied RGBA.
fn composite(target: &mut RgbImage, layer: &Pixmap) {
    let data = layer.data();
    for (x, y, pixel) in target.enumerate_pixels_mut() {
        let offset = ((y * layer.width() + x) * 4) as usize;
        let Some(rgba) = data.get(offset..offset + 4) else {
            continue;
        };
        let alpha = rgba[3] as u32;
        if alpha == 0 {
            continue;
        }
        let keep = 255 - alpha;
        let Rgb([r, g, b]) = *pixel;
        *pixel = Rgb([
            blend(rgba[0], r, keep),
            blend(rgba[1], g, keep),
            blend(rgba[2], b, keep),
        ]);
    }
}

fn blend(src: u8, dst: u8, keep: u32) -> u8 {
    (src as u32 + (dst as u32 * keep + 127) / 255).min(255) as u8
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(text: &str) -> PlacedLine {
        PlacedLine {
            text: text.to_string(),
            x: 4.0,
            y: 2.0,
            width: 20.0,
            height: 10.0,
        }
    }

    #[test]
    fn layer_escapes_text_and_sets_ink() {
        let rasterizer = Rasterizer::system();
        let target = RgbImage::new(40, 20);
        let mut layer = rasterizer.layer(&target);
        layer.push_lines(&[placed("A & <B>")], 10, 8.0, Ink::Light);

        let svg = layer.to_svg();
        assert!(svg.contains("A &amp; &lt;B&gt;"));
        assert!(svg.contains(r##"fill="#ffffff""##));
        assert!(svg.contains(r#"y="10""#));
    }

    #[test]
    fn blank_lines_add_nothing() {
        let rasterizer = Rasterizer::system();
        let mut target = RgbImage::from_pixel(10, 10, Rgb([200, 200, 200]));
        let mut layer = rasterizer.layer(&target);
        layer.push_lines(&[placed("  ")], 10, 8.0, Ink::Dark);

        assert!(layer.is_empty());
        rasterizer.draw(&mut target, &layer).unwrap();
        assert!(target.pixels().all(|pixel| *pixel == Rgb([200, 200, 200])));
    }

    #[test]
    fn composite_blends_premultiplied_pixels() {
        let mut target = RgbImage::from_pixel(2, 1, Rgb([255, 255, 255]));
        let mut layer = Pixmap::new(2, 1).unwrap();
        // Opaque black, then half-covered black (premultiplied zero colour).
        layer.data_mut().copy_from_slice(&[0, 0, 0, 255, 0, 0, 0, 128]);

        composite(&mut target, &layer);
        assert_eq!(*target.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*target.get_pixel(1, 0), Rgb([127, 127, 127]));
    }
}
