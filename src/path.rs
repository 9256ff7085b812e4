//! Path construction (§3.3, §4.4).
//!
//! The current path is a list of sub-paths, each a list of
//! [`PathElement`]s, all stored in **device space** (line width, dash, and
//! other line parameters stay in user space and are only transformed at
//! stroke time — see [`crate::graphics_state::GraphicsState`]).

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubPath {
    pub elements: Vec<PathElement>,
}

impl SubPath {
    pub fn is_closed(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::ClosePath))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    pub subpaths: Vec<SubPath>,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.subpaths.is_empty()
    }

    pub fn clear(&mut self) {
        self.subpaths.clear();
    }

    /// `moveto`. Consecutive movetos collapse into a single moveto (§4.4).
    pub fn move_to(&mut self, x: f64, y: f64) {
        if let Some(sub) = self.subpaths.last_mut() {
            if sub.elements.len() == 1 {
                if let Some(PathElement::MoveTo(_, _)) = sub.elements.first() {
                    sub.elements[0] = PathElement::MoveTo(x, y);
                    return;
                }
            }
        }
        self.subpaths.push(SubPath { elements: vec![PathElement::MoveTo(x, y)] });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.ensure_subpath();
        self.subpaths.last_mut().unwrap().elements.push(PathElement::LineTo(x, y));
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        self.ensure_subpath();
        self.subpaths.last_mut().unwrap().elements.push(PathElement::CurveTo(x1, y1, x2, y2, x3, y3));
    }

    pub fn close_path(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            if !sub.is_closed() {
                sub.elements.push(PathElement::ClosePath);
            }
        }
    }

    fn ensure_subpath(&mut self) {
        if self.subpaths.is_empty() {
            self.subpaths.push(SubPath::default());
        }
    }

    /// The device-space endpoint of the last-appended element, i.e. the
    /// current point (§3.3). `None` once the path is empty or after the
    /// boundary events named in §4.4 (`newpath`, `fill`, `stroke`, …).
    pub fn current_point(&self) -> Option<(f64, f64)> {
        let sub = self.subpaths.last()?;
        match sub.elements.last()? {
            PathElement::MoveTo(x, y) | PathElement::LineTo(x, y) => Some((*x, *y)),
            PathElement::CurveTo(_, _, _, _, x, y) => Some((*x, *y)),
            PathElement::ClosePath => {
                // Closing returns to the sub-path's starting point.
                if let Some(PathElement::MoveTo(x, y)) = sub.elements.first() {
                    Some((*x, *y))
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_movetos_collapse() {
        let mut p = Path::default();
        p.move_to(0.0, 0.0);
        p.move_to(5.0, 5.0);
        assert_eq!(p.subpaths.len(), 1);
        assert_eq!(p.subpaths[0].elements, vec![PathElement::MoveTo(5.0, 5.0)]);
    }

    #[test]
    fn current_point_tracks_last_endpoint() {
        let mut p = Path::default();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.curve_to(10.0, 5.0, 5.0, 10.0, 0.0, 10.0);
        assert_eq!(p.current_point(), Some((0.0, 10.0)));
    }
}
