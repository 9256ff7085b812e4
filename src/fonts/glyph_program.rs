//! Shared glyph-outline plumbing used by the Type 1, Type 2 (CFF), and
//! Type 42 interpreters: every one of them produces path operations in
//! *character space* and this module carries them through `FontMatrix`, then
//! the CTM, into the device-space [`crate::path::Path`] the spec requires
//! (§4.6 "Both interpreters transform character-space coordinates...").

use crate::matrix::Matrix;
use crate::path::Path;

/// Accumulates character-space path operations and commits them to a
/// device-space `Path` through `font_matrix` then `ctm`.
pub struct GlyphPathBuilder {
    font_matrix: Matrix,
    ctm: Matrix,
    origin: (f64, f64),
    path: Path,
}

impl GlyphPathBuilder {
    pub fn new(font_matrix: Matrix, ctm: Matrix, origin: (f64, f64)) -> Self {
        GlyphPathBuilder { font_matrix, ctm, origin, path: Path::default() }
    }

    fn to_device(&self, x: f64, y: f64) -> (f64, f64) {
        let (cx, cy) = self.font_matrix.transform_point(x, y);
        self.ctm.transform_point(cx + self.origin.0, cy + self.origin.1)
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        let (dx, dy) = self.to_device(x, y);
        self.path.move_to(dx, dy);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        let (dx, dy) = self.to_device(x, y);
        self.path.line_to(dx, dy);
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        let (dx1, dy1) = self.to_device(x1, y1);
        let (dx2, dy2) = self.to_device(x2, y2);
        let (dx3, dy3) = self.to_device(x3, y3);
        self.path.curve_to(dx1, dy1, dx2, dy2, dx3, dy3);
    }

    pub fn close_path(&mut self) {
        self.path.close_path();
    }

    pub fn finish(self) -> Path {
        self.path
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn font_matrix(&self) -> Matrix {
        self.font_matrix
    }

    pub fn ctm(&self) -> Matrix {
        self.ctm
    }

    /// Appends every sub-path already accumulated by `other` into `self`,
    /// used by `seac` to combine a base and an accent glyph's outlines into
    /// one composite path (§4.6).
    pub fn append(&mut self, other: Path) {
        self.path.subpaths.extend(other.subpaths);
    }
}

/// Converts a quadratic Bezier (TrueType's native curve form) to the cubic
/// form the rest of the pipeline uses, via the standard one-third rule
/// (§4.6 "Type 42 TrueType").
pub fn quadratic_to_cubic(
    p0: (f64, f64),
    control: (f64, f64),
    p1: (f64, f64),
) -> (f64, f64, f64, f64, f64, f64) {
    let c1x = p0.0 + 2.0 / 3.0 * (control.0 - p0.0);
    let c1y = p0.1 + 2.0 / 3.0 * (control.1 - p0.1);
    let c2x = p1.0 + 2.0 / 3.0 * (control.0 - p1.0);
    let c2y = p1.1 + 2.0 / 3.0 * (control.1 - p1.1);
    (c1x, c1y, c2x, c2y, p1.0, p1.1)
}

/// Subroutine index bias resolution shared by Type 1 (fallback heuristic)
/// and Type 2 (CFF convention) charstring interpreters (§4.6 "Charstring
/// VMs", §9 "Subroutine bias fallback").
pub fn cff_bias(subr_count: usize) -> i32 {
    if subr_count < 1240 {
        107
    } else if subr_count < 33900 {
        1131
    } else {
        32768
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_conversion_matches_endpoints() {
        let (c1x, c1y, c2x, c2y, ex, ey) = quadratic_to_cubic((0.0, 0.0), (5.0, 10.0), (10.0, 0.0));
        assert!((ex - 10.0).abs() < 1e-9 && ey.abs() < 1e-9);
        assert!(c1x > 0.0 && c1y > 0.0);
        assert!(c2x < 10.0 && c2y > 0.0);
    }

    #[test]
    fn bias_thresholds() {
        assert_eq!(cff_bias(10), 107);
        assert_eq!(cff_bias(2000), 1131);
        assert_eq!(cff_bias(40000), 32768);
    }
}
