use super::fit::LINE_SPACING_RATIO;
use super::font::TextMeasure;
use crate::geometry::Rect;

/// One line of text positioned on the page. `y` is the top of the line box.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Centres `lines` horizontally per line and vertically as a block in `rect`.
///
/// Spacing between lines is 0.2 of the first line's height. Blocks taller or
/// wider than the region overflow evenly on both sides.
pub fn layout_lines<M: TextMeasure + ?Sized>(
    lines: &[String],
    rect: &Rect,
    font: &M,
    size: u32,
) -> Vec<PlacedLine> {
    if lines.is_empty() {
        return Vec::new();
    }

    let extents: Vec<_> = lines.iter().map(|line| font.measure(line, size)).collect();
    let spacing = extents[0].height * LINE_SPACING_RATIO;
    let total_height = extents.iter().map(|extent| extent.height).sum::<f32>()
        + spacing * (lines.len() - 1) as f32;

    let mut y = rect.y as f32 + (rect.height as f32 - total_height) / 2.0;
    let mut placed = Vec::with_capacity(lines.len());
    for (line, extent) in lines.iter().zip(extents) {
        placed.push(PlacedLine {
            text: line.clone(),
            x: rect.x as f32 + (rect.width as f32 - extent.width) / 2.0,
            y,
            width: extent.width,
            height: extent.height,
        });
        y += extent.height + spacing;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mono;

    impl TextMeasure for Mono {
        fn text_width(&self, text: &str, size: u32) -> f32 {
            text.chars().count() as f32 * size as f32 * 0.5
        }

        fn line_height(&self, size: u32) -> f32 {
            size as f32
        }
    }

    fn centre(line: &PlacedLine) -> (f32, f32) {
        (line.x + line.width / 2.0, line.y)
    }

    #[test]
    fn lines_share_the_horizontal_centre_of_the_region() {
        let rect = Rect::new(100, 50, 200, 120);
        let lines = vec!["A".to_string(), "WIDER LINE".to_string(), "MID".to_string()];
        let placed = layout_lines(&lines, &rect, &Mono, 10);

        for line in &placed {
            assert!((centre(line).0 - rect_centre_x(&rect)).abs() <= 1.0);
        }
    }

    #[test]
    fn block_is_vertically_centred() {
        let rect = Rect::new(0, 0, 100, 100);
        let lines = vec!["ONE".to_string(), "TWO".to_string()];
        let placed = layout_lines(&lines, &rect, &Mono, 10);

        // 10 + 2 + 10 = 22 tall, so the block starts at 39.
        assert!((placed[0].y - 39.0).abs() < 1e-4);
        assert!((placed[1].y - 51.0).abs() < 1e-4);
        let block_bottom = placed[1].y + placed[1].height;
        assert!(((placed[0].y + block_bottom) / 2.0 - 50.0).abs() <= 1.0);
    }

    #[test]
    fn overflowing_block_spills_evenly() {
        let rect = Rect::new(10, 10, 20, 5);
        let placed = layout_lines(&["TOOLONG".to_string()], &rect, &Mono, 10);
        assert!((placed[0].x - (10.0 + (20.0 - 35.0) / 2.0)).abs() < 1e-4);
        assert!((placed[0].y - 7.5).abs() < 1e-4);
    }

    #[test]
    fn no_lines_places_nothing() {
        assert!(layout_lines(&[], &Rect::new(0, 0, 10, 10), &Mono, 10).is_empty());
    }

    fn rect_centre_x(rect: &Rect) -> f32 {
        rect.x as f32 + rect.width as f32 / 2.0
    }
}
