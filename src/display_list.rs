//! The display list (§4.5): the back-end-agnostic contract between
//! PostScript semantics and device output. The core only appends records;
//! back-end renderers (out of scope here) are the sole consumers.

use crate::color::Color;
use crate::fonts::FontId;
use crate::matrix::Matrix;
use crate::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingRule {
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeParams {
    pub line_width: f64,
    pub line_cap: u8,
    pub line_join: u8,
    pub miter_limit: f64,
    pub dash_offset: f64,
}

/// A glyph-cache key, re-exported here because `GlyphStart`/`GlyphRef`
/// display-list records carry it (§4.6).
pub type GlyphCacheKeyRef = crate::glyph_cache::GlyphCacheKey;

#[derive(Debug, Clone)]
pub enum DisplayRecord {
    Path(Path),
    Fill { color: Color, rule: WindingRule },
    Stroke { color: Color, params: StrokeParams, dash: Vec<f64>, ctm: Matrix },
    ClipElement { path: Path, rule: WindingRule, is_initclip: bool },
    ImageElement { ctm: Matrix, image_matrix: Matrix, width: u32, height: u32, bits_per_sample: u8, samples: Vec<u8> },
    ImageMaskElement { ctm: Matrix, image_matrix: Matrix, width: u32, height: u32, samples: Vec<u8>, invert: bool },
    ColorImageElement { ctm: Matrix, image_matrix: Matrix, width: u32, height: u32, space: crate::color::ColorSpace, samples: Vec<u8> },
    TextObj { text: Vec<u8>, start: (f64, f64), font: FontId, size: f64, color: Color, ctm: Matrix, font_matrix: Matrix },
    ActualTextStart { unicode: String },
    ActualTextEnd,
    GlyphStart { key: GlyphCacheKeyRef, position: (f64, f64) },
    GlyphEnd,
    GlyphRef { key: GlyphCacheKeyRef, position: (f64, f64) },
    PatternFill { pattern_name: String, ctm: Matrix },
    AxialShadingFill { shading_name: String, ctm: Matrix },
    RadialShadingFill { shading_name: String, ctm: Matrix },
    FunctionShadingFill { shading_name: String, ctm: Matrix },
    ShowPage,
    ErasePage,
}

#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub records: Vec<DisplayRecord>,
}

impl DisplayList {
    pub fn push(&mut self, record: DisplayRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
