//! The graphics-state machine (§3.3, §4.4).

use crate::color::Color;
use crate::display_list::WindingRule;
use crate::fonts::FontId;
use crate::matrix::Matrix;
use crate::object::PDict;
use crate::path::Path;

/// `(clip_path, winding_rule)` plus the monotonically increasing version
/// counter used to elide redundant `ClipElement` emissions (§4.4, glossary
/// "Clipping-path version"). The clip itself lives on the graphics state, so
/// `gsave`/`grestore` naturally stack it along with everything else.
#[derive(Debug, Clone)]
pub struct ClipState {
    pub path: Path,
    pub rule: WindingRule,
    pub version: u64,
}

impl ClipState {
    pub fn whole_page(version: u64) -> Self {
        ClipState { path: Path::default(), rule: WindingRule::NonZero, version }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

/// A single graphics state snapshot (§3.3). `gsave` pushes a clone with
/// `is_save_created = false`; a VM-level `save` marks the outermost pushed
/// copy `is_save_created = true` so `grestore` knows to restore it in place
/// instead of popping it (§4.4).
#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub ictm: Matrix,
    pub path: Path,
    pub clip: ClipState,
    pub color: Color,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash: Vec<f64>,
    pub dash_offset: f64,
    pub flatness: f64,
    pub stroke_adjust: bool,
    pub overprint: bool,
    pub font: Option<FontId>,
    pub page_device: Option<PDict>,
    pub is_save_created: bool,
}

impl GraphicsState {
    pub fn new(clip_version: u64) -> Self {
        GraphicsState {
            ctm: Matrix::IDENTITY,
            ictm: Matrix::IDENTITY,
            path: Path::default(),
            clip: ClipState::whole_page(clip_version),
            color: Color::black(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: Vec::new(),
            dash_offset: 0.0,
            flatness: 1.0,
            stroke_adjust: false,
            overprint: false,
            font: None,
            page_device: None,
            is_save_created: false,
        }
    }

    /// Recomputes and caches the inverse CTM; `None` on a singular CTM
    /// (callers raise `undefinedresult`, per §8 boundary behaviors).
    pub fn set_ctm(&mut self, ctm: Matrix) -> Option<()> {
        let inv = ctm.invert()?;
        self.ctm = ctm;
        self.ictm = inv;
        Some(())
    }
}
