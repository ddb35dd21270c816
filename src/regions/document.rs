use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::RegionList;
use crate::geometry::OperatorRect;

/// Canvas export of operator edits: `{"version": ..., "objects": [...]}`.
///
/// Only the geometry of each object is read; styling keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub objects: Vec<OperatorRect>,
}

pub fn write_region_list(path: &Path, regions: &RegionList) -> Result<()> {
    let json = serde_json::to_vec_pretty(regions)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write region list: {}", path.display()))
}

pub fn read_region_list(path: &Path) -> Result<RegionList> {
    let content = fs::read(path)
        .with_context(|| format!("failed to read region list: {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("failed to parse region list: {}", path.display()))
}

pub fn read_canvas_document(path: &Path) -> Result<CanvasDocument> {
    let content = fs::read(path)
        .with_context(|| format!("failed to read operator edits: {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("failed to parse operator edits: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn region_list_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_regions.json");
        let regions = RegionList::new(vec![Rect::new(10, 10, 100, 50), Rect::new(0, 80, 4, 4)]);

        write_region_list(&path, &regions).unwrap();
        assert_eq!(read_region_list(&path).unwrap(), regions);
    }

    #[test]
    fn canvas_document_ignores_styling_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        fs::write(
            &path,
            r##"{"version":"4.4.0","objects":[{"type":"rect","left":12,"top":11,"width":49,"height":49,"stroke":"#8fce00","scaleX":2,"scaleY":1,"angle":0}]}"##,
        )
        .unwrap();

        let document = read_canvas_document(&path).unwrap();
        assert_eq!(document.objects.len(), 1);
        assert_eq!(document.objects[0].effective_width(), 98.0);
        assert_eq!(document.objects[0].effective_height(), 49.0);
    }
}
