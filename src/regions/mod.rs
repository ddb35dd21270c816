mod document;
mod extract;
mod reconcile;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

pub use document::{
    CanvasDocument, read_canvas_document, read_region_list, write_region_list,
};
pub use extract::{dilate, extract, extract_file, load_mask, save_mask};
pub use reconcile::{
    DEFAULT_TOLERANCE, Reconciliation, clear_region, paint_region, reconcile, restore_region,
};

/// Ordered text regions of one page.
///
/// The order is the extractor's label order and every index-aligned sequence
/// (OCR text, translations) follows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionList(Vec<Rect>);

impl RegionList {
    pub fn new(regions: Vec<Rect>) -> Self {
        Self(regions)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rect> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Rect> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[Rect] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Rect> {
        self.0
    }
}

impl From<Vec<Rect>> for RegionList {
    fn from(regions: Vec<Rect>) -> Self {
        Self(regions)
    }
}

impl<'a> IntoIterator for &'a RegionList {
    type Item = &'a Rect;
    type IntoIter = std::slice::Iter<'a, Rect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
