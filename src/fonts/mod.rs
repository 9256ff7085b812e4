//! Font & glyph pipeline (§4.6).
//!
//! `FontDict` models the one PostScript font dictionary; its `FontType`
//! payload selects which charstring/outline machinery renders a glyph.
//! `scalefont`/`makefont` share `CharStrings`/`Private` (or `sfnts`) with the
//! font they're derived from and only replace `FontMatrix` — mirrored here by
//! cloning the `Rc`-shared program data and composing a new matrix.

pub mod cff_type2;
pub mod glyph_program;
pub mod type0_cmap;
pub mod type1;
pub mod type3;
pub mod type42_truetype;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::matrix::Matrix;
use crate::object::PDict;

/// Opaque font identity (§3.1 "FontID"). Resolves the open question in spec
/// §9 ("FontID stability") the way the spec itself suggests: a small
/// monotonic counter assigned at `definefont`/`scalefont`/`makefont` time,
/// rather than keying off a Rust-side pointer identity that GC churn (not a
/// concern here, but keeping the contract stable regardless) could alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(pub u64);

static NEXT_FONT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_font_id() -> FontId {
    FontId(NEXT_FONT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontType {
    Type0 = 0,
    Type1 = 1,
    Type2 = 2,
    Type3 = 3,
    Type42 = 42,
}

/// Program data shared, unmodified, across `scalefont`/`makefont` copies.
#[derive(Debug)]
pub enum FontProgram {
    Type1 { char_strings: HashMap<String, Vec<u8>>, subrs: Vec<Vec<u8>>, len_iv: i32, encoding: HashMap<u8, String> },
    Type2(cff_type2::CffFont),
    Type3 { char_procs: PDict, build_char_is_build_glyph: bool, encoding: HashMap<u8, String> },
    Type0 { cmap: type0_cmap::CMap, descendants: Vec<FontId> },
    Type42(type42_truetype::TrueTypeFont),
}

/// One font dictionary (§4.6 "Font dictionaries").
#[derive(Debug)]
pub struct FontDict {
    pub id: FontId,
    pub font_type: FontType,
    pub font_matrix: Matrix,
    pub font_name: Option<String>,
    pub program: Rc<FontProgram>,
    /// Distinguishes `scalefont`-derived fonts for the glyph-cache fallback
    /// identity rule (§4.6 "font-identity"): when `FontName` is absent we key
    /// on this field's originating program instead of on Rust pointer
    /// identity, which this design keeps stable across clones anyway.
    pub paint_type: i32,
}

impl FontDict {
    /// `scalefont` / `makefont`: shallow copy with a new `FontMatrix`,
    /// sharing `program` (and therefore `CharStrings`/`Private`/`sfnts`).
    pub fn derive(&self, new_matrix: Matrix) -> FontDict {
        FontDict {
            id: next_font_id(),
            font_type: self.font_type,
            font_matrix: new_matrix,
            font_name: self.font_name.clone(),
            program: Rc::clone(&self.program),
            paint_type: self.paint_type,
        }
    }

    /// The cache-key "font-identity" component (§4.6): `FontName` bytes when
    /// present, else the address of the shared program — stable across
    /// `scalefont`/`makefont` because those share the same `Rc`.
    pub fn identity_key(&self) -> Vec<u8> {
        if let Some(name) = &self.font_name {
            name.as_bytes().to_vec()
        } else {
            (Rc::as_ptr(&self.program) as usize).to_le_bytes().to_vec()
        }
    }
}

#[derive(Default)]
pub struct FontTable {
    pub fonts: HashMap<FontId, Rc<FontDict>>,
    /// Name → FontID registry `definefont` populates and `findfont` searches
    /// (§4.6 "Font dictionaries"; the PostScript-visible `FontDirectory`).
    directory: HashMap<String, FontId>,
}

impl FontTable {
    pub fn insert(&mut self, font: FontDict) -> FontId {
        let id = font.id;
        self.fonts.insert(id, Rc::new(font));
        id
    }

    pub fn get(&self, id: FontId) -> Option<Rc<FontDict>> {
        self.fonts.get(&id).cloned()
    }

    pub fn register_name(&mut self, name: String, id: FontId) {
        self.directory.insert(name, id);
    }

    pub fn find_by_name(&self, name: &str) -> Option<FontId> {
        self.directory.get(name).copied()
    }
}
