use image::{GrayImage, Luma, imageops};
use imageproc::drawing::draw_filled_rect_mut;
use tracing::debug;

use super::RegionList;
use crate::geometry::{OperatorRect, Rect, rectangles_almost_identical};

pub const DEFAULT_TOLERANCE: u32 = 5;

/// Outcome of one reconciliation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Machine regions no operator rectangle matched, in their original order.
    pub remaining: RegionList,
    /// Machine regions consumed by operator rectangles, in operator order.
    pub resolved: Vec<Rect>,
    /// Indexes of operator rectangles that matched no machine region.
    pub unmatched_operator: Vec<usize>,
}

/// Matches operator rectangles against machine regions and clears every
/// machine region of the round from `mask`.
///
/// Matching is greedy: each operator rectangle consumes the first remaining
/// machine region within `tolerance`, and a consumed region is unavailable to
/// later operator rectangles.
pub fn reconcile(
    regions: &RegionList,
    operator: &[OperatorRect],
    mask: &mut GrayImage,
    tolerance: u32,
) -> Reconciliation {
    let mut remaining: Vec<Rect> = regions.iter().copied().collect();
    let mut resolved = Vec::new();
    let mut unmatched_operator = Vec::new();

    for (edit_index, edit) in operator.iter().enumerate() {
        match remaining
            .iter()
            .position(|region| rectangles_almost_identical(region, edit, tolerance))
        {
            Some(index) => resolved.push(remaining.remove(index)),
            None => unmatched_operator.push(edit_index),
        }
    }

    for region in resolved.iter().chain(remaining.iter()) {
        clear_region(mask, region);
    }

    debug!(
        "reconciled {} operator rectangle(s): {} resolved, {} remaining",
        operator.len(),
        resolved.len(),
        remaining.len()
    );

    Reconciliation {
        remaining: remaining.into(),
        resolved,
        unmatched_operator,
    }
}

/// Copies the pixels of `region` from `original` back into `mask`.
pub fn restore_region(mask: &mut GrayImage, original: &GrayImage, region: &Rect) {
    let width = mask.width().min(original.width());
    let height = mask.height().min(original.height());
    let Some(rect) = region.clamp_to(width, height) else {
        return;
    };
    let patch = imageops::crop_imm(original, rect.x, rect.y, rect.width, rect.height).to_image();
    imageops::replace(mask, &patch, rect.x as i64, rect.y as i64);
}

/// Marks all of `region` as text.
pub fn paint_region(mask: &mut GrayImage, region: &Rect) {
    fill_region(mask, region, 255);
}

/// Marks all of `region` as background.
pub fn clear_region(mask: &mut GrayImage, region: &Rect) {
    fill_region(mask, region, 0);
}

fn fill_region(mask: &mut GrayImage, region: &Rect, value: u8) {
    let (width, height) = mask.dimensions();
    let Some(rect) = region.clamp_to(width, height) else {
        return;
    };
    draw_filled_rect_mut(
        mask,
        imageproc::rect::Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
        Luma([value]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::extract;

    fn mask_with(rects: &[Rect], width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for rect in rects {
            for y in rect.y..rect.bottom() {
                for x in rect.x..rect.right() {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }

    fn region_is_clear(mask: &GrayImage, rect: &Rect) -> bool {
        (rect.y..rect.bottom()).all(|y| (rect.x..rect.right()).all(|x| mask.get_pixel(x, y)[0] == 0))
    }

    #[test]
    fn operator_copy_of_regions_resolves_everything() {
        let rects = [Rect::new(2, 2, 10, 10), Rect::new(30, 5, 8, 12), Rect::new(5, 30, 20, 6)];
        let mut mask = mask_with(&rects, 64, 48);
        let regions = extract(&mut mask, 0);
        let operator: Vec<OperatorRect> = regions.iter().copied().map(OperatorRect::from).collect();

        let outcome = reconcile(&regions, &operator, &mut mask, 0);
        assert!(outcome.remaining.is_empty());
        assert_eq!(outcome.resolved, regions.clone().into_inner());
        for rect in &rects {
            assert!(region_is_clear(&mask, rect));
        }
        assert!(extract(&mut mask, 0).is_empty());
    }

    #[test]
    fn unmatched_operator_rectangle_is_a_no_op() {
        let rects = [Rect::new(2, 2, 10, 10)];
        let mut mask = mask_with(&rects, 32, 32);
        let regions = extract(&mut mask, 0);

        let outcome = reconcile(
            &regions,
            &[OperatorRect::new(20.0, 20.0, 5.0, 5.0)],
            &mut mask,
            DEFAULT_TOLERANCE,
        );
        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.remaining, regions);
        assert_eq!(outcome.unmatched_operator, vec![0]);
    }

    #[test]
    fn unmatched_machine_regions_are_burned_into_mask() {
        let rects = [Rect::new(2, 2, 10, 10), Rect::new(20, 2, 10, 10)];
        let mut mask = mask_with(&rects, 40, 20);
        let regions = extract(&mut mask, 0);

        let outcome = reconcile(
            &regions,
            &[OperatorRect::new(2.0, 2.0, 10.0, 10.0)],
            &mut mask,
            DEFAULT_TOLERANCE,
        );
        assert_eq!(outcome.remaining.as_slice(), &[Rect::new(20, 2, 10, 10)]);
        assert!(region_is_clear(&mask, &rects[1]));
    }

    #[test]
    fn first_qualifying_region_wins_and_is_consumed_once() {
        let regions = RegionList::new(vec![
            Rect::new(10, 10, 20, 20),
            Rect::new(12, 12, 20, 20),
        ]);
        let mut mask = GrayImage::new(50, 50);
        let edit = OperatorRect::new(11.0, 11.0, 20.0, 20.0);

        let outcome = reconcile(&regions, &[edit, edit], &mut mask, 5);
        assert_eq!(
            outcome.resolved,
            vec![Rect::new(10, 10, 20, 20), Rect::new(12, 12, 20, 20)]
        );
        assert!(outcome.remaining.is_empty());

        let outcome = reconcile(&regions, &[edit], &mut mask, 5);
        assert_eq!(outcome.resolved, vec![Rect::new(10, 10, 20, 20)]);
        assert_eq!(outcome.remaining.as_slice(), &[Rect::new(12, 12, 20, 20)]);
    }

    #[test]
    fn remaining_keeps_label_order() {
        let regions = RegionList::new(vec![
            Rect::new(0, 0, 4, 4),
            Rect::new(10, 0, 4, 4),
            Rect::new(20, 0, 4, 4),
        ]);
        let mut mask = GrayImage::new(30, 10);
        let outcome = reconcile(
            &regions,
            &[OperatorRect::new(10.0, 0.0, 4.0, 4.0)],
            &mut mask,
            0,
        );
        assert_eq!(
            outcome.remaining.as_slice(),
            &[Rect::new(0, 0, 4, 4), Rect::new(20, 0, 4, 4)]
        );
    }

    #[test]
    fn restore_and_paint_touch_only_their_region() {
        let original = mask_with(&[Rect::new(2, 2, 3, 3)], 20, 20);
        let mut mask = GrayImage::new(20, 20);

        restore_region(&mut mask, &original, &Rect::new(0, 0, 10, 10));
        assert_eq!(mask, original);

        paint_region(&mut mask, &Rect::new(12, 12, 4, 4));
        assert_eq!(mask.get_pixel(12, 12)[0], 255);
        assert_eq!(mask.get_pixel(15, 15)[0], 255);
        assert_eq!(mask.get_pixel(16, 16)[0], 0);
    }

    #[test]
    fn regions_outside_the_mask_are_ignored_when_clearing() {
        let regions = RegionList::new(vec![Rect::new(60, 60, 10, 10)]);
        let mut mask = GrayImage::from_pixel(20, 20, Luma([255]));
        let outcome = reconcile(&regions, &[], &mut mask, 5);
        assert_eq!(outcome.remaining, regions);
        assert_eq!(mask.get_pixel(19, 19)[0], 255);
    }
}
