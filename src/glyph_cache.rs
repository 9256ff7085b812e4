//! The two-level glyph cache (§4.6 "Glyph caching").
//!
//! A path-level cache holds device-space outlines keyed only by the
//! shape-determining part of the fingerprint (font identity, glyph selector,
//! CTM scale, font matrix); a bitmap-level cache additionally keys on color
//! and sub-pixel Y phase, since those affect the rendered bitmap but not the
//! outline. Both are bounded LRUs — unbounded growth across a long job is
//! exactly what this cache exists to avoid.

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::color::Color;
use crate::matrix::round10;
use crate::path::Path;

/// Selects which glyph within a font: a name (Type 1/Type 3), a GID
/// (Type 42/CFF CID-keyed), or a character code (simple encodings).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlyphSelector {
    Name(String),
    Gid(u32),
    Code(u8),
}

/// The cache-key fingerprint (§4.6): font identity, glyph selector, the
/// scale-affecting part of the CTM, the font matrix, color, and sub-pixel Y
/// phase. Rounded to 10 decimal places so that floating-point jitter below
/// that precision doesn't fragment the cache (matches the rounding the
/// matrix module already applies to transform results).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlyphCacheKey {
    pub font_identity: Vec<u8>,
    pub selector: GlyphSelector,
    pub ctm_scale: [u64; 4],
    pub font_matrix: [u64; 4],
    pub color: Option<(i64, i64, i64, i64)>,
    pub subpixel_y: Option<u64>,
}

fn bits(v: f64) -> u64 {
    round10(v).to_bits()
}

impl GlyphCacheKey {
    /// Builds the path-level key: shape-determining fields only.
    pub fn for_path(font_identity: Vec<u8>, selector: GlyphSelector, ctm: &[f64; 4], font_matrix: &[f64; 4]) -> Self {
        GlyphCacheKey {
            font_identity,
            selector,
            ctm_scale: [bits(ctm[0]), bits(ctm[1]), bits(ctm[2]), bits(ctm[3])],
            font_matrix: [bits(font_matrix[0]), bits(font_matrix[1]), bits(font_matrix[2]), bits(font_matrix[3])],
            color: None,
            subpixel_y: None,
        }
    }

    /// Extends a path-level key into a bitmap-level key by adding color and
    /// sub-pixel Y phase.
    pub fn for_bitmap(mut self, color: &Color, subpixel_y: f64) -> Self {
        self.color = Some(color.quantized());
        self.subpixel_y = Some(bits(subpixel_y));
        self
    }
}

const DEFAULT_CAPACITY: usize = 512;

/// Path-level cache: device-space outlines plus the text-space advance the
/// charstring interpreter derived alongside them (cheap to carry, expensive
/// to recompute — re-running the interpreter on a cache hit just to recover
/// the width would defeat the point of caching), shape keyed only.
pub struct PathCache {
    inner: LruCache<GlyphCacheKey, (Path, (f64, f64))>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        PathCache { inner: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()) }
    }

    pub fn get(&mut self, key: &GlyphCacheKey) -> Option<&(Path, (f64, f64))> {
        self.inner.get(key)
    }

    pub fn put(&mut self, key: GlyphCacheKey, path: Path, advance: (f64, f64)) {
        self.inner.put(key, (path, advance));
    }
}

impl Default for PathCache {
    fn default() -> Self {
        PathCache::new(DEFAULT_CAPACITY)
    }
}

/// Bitmap-level cache: rasterized coverage buffers, keyed with color and
/// sub-pixel phase included. Stored as an opaque byte buffer plus the
/// raster's pixel dimensions — rasterization itself is a renderer concern.
pub struct BitmapCache {
    inner: LruCache<GlyphCacheKey, (u32, u32, Vec<u8>)>,
}

impl BitmapCache {
    pub fn new(capacity: usize) -> Self {
        BitmapCache { inner: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()) }
    }

    pub fn get(&mut self, key: &GlyphCacheKey) -> Option<&(u32, u32, Vec<u8>)> {
        self.inner.get(key)
    }

    pub fn put(&mut self, key: GlyphCacheKey, width: u32, height: u32, bitmap: Vec<u8>) {
        self.inner.put(key, (width, height, bitmap));
    }
}

impl Default for BitmapCache {
    fn default() -> Self {
        BitmapCache::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_cache_hits_on_identical_key() {
        let mut cache = PathCache::new(4);
        let key = GlyphCacheKey::for_path(vec![1, 2, 3], GlyphSelector::Name("A".into()), &[1.0, 0.0, 0.0, 1.0], &[0.001, 0.0, 0.0, 0.001]);
        cache.put(key.clone(), Path::default(), (500.0, 0.0));
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn bitmap_key_differs_by_color() {
        let base = GlyphCacheKey::for_path(vec![1], GlyphSelector::Code(65), &[1.0, 0.0, 0.0, 1.0], &[0.001, 0.0, 0.0, 0.001]);
        let black = base.clone().for_bitmap(&Color::black(), 0.0);
        let white = base.for_bitmap(&Color::gray(1.0), 0.0);
        assert_ne!(black, white);
    }
}
