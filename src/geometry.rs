use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle, origin top-left.
///
/// Serialized as `{left, top, width, height}` so region files stay readable by
/// the canvas tooling that edits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(rename = "left")]
    pub x: u32,
    #[serde(rename = "top")]
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn overlap_area(&self, other: &Rect) -> u64 {
        self.intersection(other).map(|rect| rect.area()).unwrap_or(0)
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.overlap_area(other) as f32;
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() as f32 + other.area() as f32 - inter).max(1.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Part of the rectangle that lies inside a `width`×`height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width, height))
    }
}

/// A rectangle as reported by the editing canvas.
///
/// Canvas objects are resized by changing `scaleX`/`scaleY` rather than the
/// stored width/height, so both are kept and combined on comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatorRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "scaleX", default = "unit_scale")]
    pub scale_x: f64,
    #[serde(rename = "scaleY", default = "unit_scale")]
    pub scale_y: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl OperatorRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    pub fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn effective_width(&self) -> f64 {
        self.width * self.scale_x
    }

    pub fn effective_height(&self) -> f64 {
        self.height * self.scale_y
    }

    /// Pixel rectangle with the scale applied, cut at the image origin.
    /// `None` when nothing of it lies at non-negative coordinates.
    pub fn to_rect(&self) -> Option<Rect> {
        let right = (self.left + self.effective_width()).round();
        let bottom = (self.top + self.effective_height()).round();
        let left = self.left.round().max(0.0);
        let top = self.top.round().max(0.0);
        if !(right > left && bottom > top) {
            return None;
        }
        Some(Rect::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

impl From<Rect> for OperatorRect {
    fn from(rect: Rect) -> Self {
        OperatorRect::new(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        )
    }
}

/// True when every one of left, top, width and height differ by at most
/// `tolerance` pixels.
pub fn rectangles_almost_identical(machine: &Rect, operator: &OperatorRect, tolerance: u32) -> bool {
    let tolerance = tolerance as f64;
    let within = |a: u32, b: f64| (a as f64 - b).abs() <= tolerance;
    within(machine.x, operator.left)
        && within(machine.y, operator.top)
        && within(machine.width, operator.effective_width())
        && within(machine.height, operator.effective_height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_rect_converts_to_pixels() {
        let scaled = OperatorRect::new(12.0, 11.0, 49.0, 49.0).with_scale(2.0, 1.0);
        assert_eq!(scaled.to_rect(), Some(Rect::new(12, 11, 98, 49)));

        let clipped = OperatorRect::new(-5.0, 3.0, 10.0, 4.0);
        assert_eq!(clipped.to_rect(), Some(Rect::new(0, 3, 5, 4)));
        assert_eq!(OperatorRect::new(-20.0, 0.0, 10.0, 4.0).to_rect(), None);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let machine = Rect::new(10, 10, 100, 50);
        let exact = OperatorRect::new(15.0, 5.0, 105.0, 45.0);
        assert!(rectangles_almost_identical(&machine, &exact, 5));

        let off_left = OperatorRect::new(16.0, 10.0, 100.0, 50.0);
        let off_top = OperatorRect::new(10.0, 4.0, 100.0, 50.0);
        let off_width = OperatorRect::new(10.0, 10.0, 106.0, 50.0);
        let off_height = OperatorRect::new(10.0, 10.0, 100.0, 44.0);
        for rect in [off_left, off_top, off_width, off_height] {
            assert!(!rectangles_almost_identical(&machine, &rect, 5), "{rect:?}");
        }
    }

    #[test]
    fn canvas_scale_applies_to_size_only() {
        let machine = Rect::new(20, 30, 100, 40);
        let scaled = OperatorRect::new(20.0, 30.0, 50.0, 20.0).with_scale(2.0, 2.0);
        assert!(rectangles_almost_identical(&machine, &scaled, 0));
        let unscaled = OperatorRect::new(20.0, 30.0, 50.0, 20.0);
        assert!(!rectangles_almost_identical(&machine, &unscaled, 5));
    }

    #[test]
    fn intersection_and_union() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.overlap_area(&b), 25);
        assert_eq!(a.union(&b), Rect::new(0, 0, 15, 15));
        assert_eq!(a.intersection(&Rect::new(10, 0, 4, 4)), None);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_to_image_bounds() {
        let rect = Rect::new(90, 40, 20, 20);
        assert_eq!(rect.clamp_to(100, 50), Some(Rect::new(90, 40, 10, 10)));
        assert_eq!(Rect::new(120, 0, 5, 5).clamp_to(100, 50), None);
    }

    #[test]
    fn huge_canvas_objects_clamp_without_overflow() {
        let far = OperatorRect::new(1e12, 0.0, 1e12, 10.0).to_rect().unwrap();
        assert_eq!(far.right(), u32::MAX);
        assert_eq!(far.clamp_to(100, 50), None);

        let wide = Rect::new(10, 5, u32::MAX, u32::MAX);
        assert_eq!(wide.clamp_to(100, 50), Some(Rect::new(10, 5, 90, 45)));
    }

    #[test]
    fn rect_serializes_with_canvas_names() {
        let json = serde_json::to_string(&Rect::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"left":1,"top":2,"width":3,"height":4}"#);
        let canvas: OperatorRect =
            serde_json::from_str(r#"{"left":1.5,"top":2,"width":3,"height":4}"#).unwrap();
        assert_eq!(canvas.scale_x, 1.0);
        assert_eq!(canvas.left, 1.5);
    }
}
