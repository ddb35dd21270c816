use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Font file and point size, passed around by value.
///
/// `path: None` resolves a system sans-serif face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub path: Option<PathBuf>,
    pub size: u32,
}

impl FontSpec {
    pub fn new(path: Option<PathBuf>, size: u32) -> Self {
        Self { path, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

/// Pixel measurement of a string at an arbitrary integer size.
pub trait TextMeasure {
    fn text_width(&self, text: &str, size: u32) -> f32;

    fn line_height(&self, size: u32) -> f32;

    /// Distance from the top of a line to its baseline.
    fn ascent(&self, size: u32) -> f32 {
        self.line_height(size) * 0.8
    }

    fn measure(&self, text: &str, size: u32) -> TextExtent {
        TextExtent {
            width: self.text_width(text, size),
            height: self.line_height(size),
        }
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .field("face_index", &self.face_index)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn scale(&self, size: u32) -> f32 {
        size as f32 / self.units_per_em.max(1) as f32
    }
}

impl TextMeasure for FontMetrics {
    fn text_width(&self, text: &str, size: u32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return EstimatedMetrics.text_width(text, size);
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * self.scale(size)
    }

    fn line_height(&self, size: u32) -> f32 {
        (self.ascender as i32 - self.descender as i32).max(1) as f32 * self.scale(size)
    }

    fn ascent(&self, size: u32) -> f32 {
        self.ascender.max(0) as f32 * self.scale(size)
    }
}

/// Width estimate used when no font file is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl TextMeasure for EstimatedMetrics {
    fn text_width(&self, text: &str, size: u32) -> f32 {
        text.chars().map(estimate_char_units).sum::<f32>() * size as f32
    }

    fn line_height(&self, size: u32) -> f32 {
        size as f32 * 1.1
    }

    fn ascent(&self, size: u32) -> f32 {
        size as f32 * 0.9
    }
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if super::fit::is_cjk(ch) {
        1.0
    } else {
        0.9
    }
}

/// A loaded face plus the size the operator asked for.
#[derive(Debug, Clone)]
pub struct TypesetFont {
    spec: FontSpec,
    metrics: FontMetrics,
    family: String,
}

impl TypesetFont {
    pub fn load(spec: FontSpec, fallback: &[&str]) -> Result<Self> {
        let metrics = match spec.path.as_deref() {
            Some(path) => load_font_metrics(path)?,
            None => resolve_system_font(fallback)?,
        };
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "sans-serif".to_string());
        Ok(Self {
            spec,
            metrics,
            family,
        })
    }

    pub fn initial_size(&self) -> u32 {
        self.spec.size
    }

    pub fn spec(&self) -> &FontSpec {
        &self.spec
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn data(&self) -> &[u8] {
        self.metrics.data()
    }
}

impl TextMeasure for TypesetFont {
    fn text_width(&self, text: &str, size: u32) -> f32 {
        self.metrics.text_width(text, size)
    }

    fn line_height(&self, size: u32) -> f32 {
        self.metrics.line_height(size)
    }

    fn ascent(&self, size: u32) -> f32 {
        self.metrics.ascent(size)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn resolve_system_font(fallback: &[&str]) -> Result<FontMetrics> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    for candidate in fallback {
        if let Ok(metrics) = load_font_metrics_from_family(&db, candidate) {
            return Ok(metrics);
        }
    }
    Err(anyhow!(
        "no system font found (tried {})",
        fallback.join(", ")
    ))
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(data, index) else {
            continue;
        };
        let family = extract_family_name(&face);
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let metrics = FontMetrics {
            data: Arc::new(data.to_vec()),
            units_per_em,
            space_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            family: family.clone(),
            face_index: index,
        };
        if let (Some(preferred), Some(found)) = (preferred_family, &family) {
            if found.eq_ignore_ascii_case(preferred) {
                return Ok(metrics);
            }
        }
        if fallback.is_none() {
            fallback = Some(metrics);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(&data, Some(family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
