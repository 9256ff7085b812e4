//! Type 2 (CFF) CharString interpretation (§4.6).
//!
//! Unlike Type 1, Type 2 charstrings are not encrypted and carry a richer
//! opcode set: an optional leading width argument, `hintmask`/`cntrmask`
//! consuming implicit vstem counts, the `h*curveto`/`v*curveto` families with
//! an optional trailing tangent argument, `rcurveline`/`rlinecurve`, the
//! built-in `flex`/`hflex`/`hflex1`/`flex1` operators, and a transient array
//! plus simple arithmetic/stack operators. Local and global subroutine
//! indices are both bias-corrected by CFF convention (107/1131/32768).

use std::collections::HashMap;

use crate::error::{err, ErrorKind, PSError};
use crate::fonts::glyph_program::{cff_bias, GlyphPathBuilder};
use crate::matrix::Matrix;

#[derive(Debug, Default)]
pub struct CffFont {
    pub char_strings: HashMap<String, Vec<u8>>,
    pub local_subrs: Vec<Vec<u8>>,
    pub global_subrs: Vec<Vec<u8>>,
    pub default_width_x: f64,
    pub nominal_width_x: f64,
}

pub struct Type2Interpreter<'a> {
    font: &'a CffFont,
    stack: Vec<f64>,
    transient: [f64; 32],
    x: f64,
    y: f64,
    n_stems: u32,
    width_parsed: bool,
    pub width: f64,
    builder: GlyphPathBuilder,
}

impl<'a> Type2Interpreter<'a> {
    pub fn new(font: &'a CffFont, font_matrix: Matrix, ctm: Matrix, origin: (f64, f64)) -> Self {
        Type2Interpreter {
            font,
            stack: Vec::new(),
            transient: [0.0; 32],
            x: 0.0,
            y: 0.0,
            n_stems: 0,
            width_parsed: false,
            width: font.default_width_x,
            builder: GlyphPathBuilder::new(font_matrix, ctm, origin),
        }
    }

    pub fn run(mut self, glyph_name: &str) -> Result<crate::path::Path, PSError> {
        let data = self
            .font
            .char_strings
            .get(glyph_name)
            .ok_or_else(|| err(ErrorKind::InvalidFont, "show", format!("no CharString for /{}", glyph_name)))?
            .clone();
        self.exec(&data, 0)?;
        Ok(self.builder.finish())
    }

    /// Width is an optional leading argument present exactly once, on the
    /// first stack-clearing operator encountered, whenever the operator's
    /// own argument count is odd (for the `*moveto`/`endchar` family) relative
    /// to what's on the stack. We detect it generically: if this is the
    /// first clearing op and one "extra" argument beyond what the op expects
    /// is present, that extra leading value is the width.
    fn take_width(&mut self, expected: usize) {
        if !self.width_parsed {
            self.width_parsed = true;
            if self.stack.len() > expected {
                self.width = self.font.nominal_width_x + self.stack.remove(0);
            }
        }
    }

    fn exec(&mut self, data: &[u8], depth: u32) -> Result<bool, PSError> {
        if depth > 32 {
            return Err(err(ErrorKind::LimitCheck, "show", "Type 2 subroutine recursion too deep"));
        }
        let mut i = 0;
        while i < data.len() {
            let b = data[i];
            i += 1;
            match b {
                32..=246 => self.stack.push(b as f64 - 139.0),
                247..=250 => {
                    let w = data[i] as f64;
                    i += 1;
                    self.stack.push((b as f64 - 247.0) * 256.0 + w + 108.0);
                }
                251..=254 => {
                    let w = data[i] as f64;
                    i += 1;
                    self.stack.push(-(b as f64 - 251.0) * 256.0 - w - 108.0);
                }
                28 => {
                    let v = i16::from_be_bytes([data[i], data[i + 1]]);
                    i += 2;
                    self.stack.push(v as f64);
                }
                255 => {
                    let v = i32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
                    i += 4;
                    self.stack.push(v as f64 / 65536.0);
                }
                12 => {
                    let b2 = data[i];
                    i += 1;
                    self.exec_escape(b2)?;
                }
                _ => {
                    if self.exec_simple(b, data, &mut i, depth)? {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    fn exec_simple(&mut self, op: u8, data: &[u8], i: &mut usize, depth: u32) -> Result<bool, PSError> {
        match op {
            1 | 3 | 18 | 23 => { // h/vstem(hm)
                self.take_width(self.stack.len() - self.stack.len() % 2);
                self.n_stems += self.stack.len() as u32 / 2;
                self.stack.clear();
            }
            19 | 20 => { // hintmask, cntrmask
                self.take_width(self.stack.len() - self.stack.len() % 2);
                self.n_stems += self.stack.len() as u32 / 2;
                self.stack.clear();
                let nbytes = ((self.n_stems + 7) / 8).max(1) as usize;
                *i += nbytes;
            }
            21 => { // rmoveto
                self.take_width(2);
                let (dx, dy) = (self.arg(0), self.arg(1));
                self.move_rel(dx, dy);
            }
            22 => { // hmoveto
                self.take_width(1);
                let dx = self.arg(0);
                self.move_rel(dx, 0.0);
            }
            4 => { // vmoveto
                self.take_width(1);
                let dy = self.arg(0);
                self.move_rel(0.0, dy);
            }
            5 => { // rlineto
                let args = self.stack.split_off(0);
                for pair in args.chunks(2) {
                    if pair.len() == 2 {
                        self.line_rel(pair[0], pair[1]);
                    }
                }
            }
            6 | 7 => { // hlineto / vlineto: alternating axis
                let args = self.stack.split_off(0);
                let mut horizontal = op == 6;
                for v in args {
                    if horizontal {
                        self.line_rel(v, 0.0);
                    } else {
                        self.line_rel(0.0, v);
                    }
                    horizontal = !horizontal;
                }
            }
            8 => { // rrcurveto
                let args = self.stack.split_off(0);
                for six in args.chunks(6) {
                    if six.len() == 6 {
                        self.curve_rel(six[0], six[1], six[2], six[3], six[4], six[5]);
                    }
                }
            }
            24 => { // rcurveline
                let mut args = self.stack.split_off(0);
                let tail = if args.len() % 6 == 2 { args.split_off(args.len() - 2) } else { Vec::new() };
                for six in args.chunks(6) {
                    if six.len() == 6 {
                        self.curve_rel(six[0], six[1], six[2], six[3], six[4], six[5]);
                    }
                }
                if tail.len() == 2 {
                    self.line_rel(tail[0], tail[1]);
                }
            }
            25 => { // rlinecurve
                let mut args = self.stack.split_off(0);
                let tail = if args.len() >= 6 { args.split_off(args.len() - 6) } else { Vec::new() };
                for pair in args.chunks(2) {
                    if pair.len() == 2 {
                        self.line_rel(pair[0], pair[1]);
                    }
                }
                if tail.len() == 6 {
                    self.curve_rel(tail[0], tail[1], tail[2], tail[3], tail[4], tail[5]);
                }
            }
            26 => self.vvcurveto(), // vvcurveto
            27 => self.hhcurveto(), // hhcurveto
            30 => self.vhcurveto(true), // vhcurveto
            31 => self.vhcurveto(false), // hvcurveto
            10 => { // callsubr
                let idx = self.stack.pop().unwrap_or(0.0) as i32;
                let bias = cff_bias(self.font.local_subrs.len());
                let resolved = (idx + bias).clamp(0, self.font.local_subrs.len() as i32 - 1).max(0) as usize;
                if let Some(sub) = self.font.local_subrs.get(resolved).cloned() {
                    if self.exec(&sub, depth + 1)? {
                        return Ok(true);
                    }
                }
            }
            29 => { // callgsubr
                let idx = self.stack.pop().unwrap_or(0.0) as i32;
                let bias = cff_bias(self.font.global_subrs.len());
                let resolved = (idx + bias).clamp(0, self.font.global_subrs.len() as i32 - 1).max(0) as usize;
                if let Some(sub) = self.font.global_subrs.get(resolved).cloned() {
                    if self.exec(&sub, depth + 1)? {
                        return Ok(true);
                    }
                }
            }
            11 => {} // return
            14 => { // endchar
                self.take_width(0);
                self.stack.clear();
                return Ok(true);
            }
            _ => {
                self.stack.clear();
            }
        }
        let _ = data;
        Ok(false)
    }

    fn exec_escape(&mut self, op: u8) -> Result<(), PSError> {
        match op {
            35 => self.flex(),   // flex
            34 => self.hflex(),  // hflex
            36 => self.hflex1(), // hflex1
            37 => self.flex1(),  // flex1
            // Arithmetic / logic / stack manipulation (subset).
            9 => { let v = self.pop1()?; self.stack.push(v.abs()); }
            10 => { let (a, b) = self.pop2()?; self.stack.push(a + b); }
            11 => { let (a, b) = self.pop2()?; self.stack.push(a - b); }
            12 => { let (a, b) = self.pop2()?; self.stack.push(a / b); }
            14 => { let v = self.pop1()?; self.stack.push(-v); }
            18 => { self.stack.pop(); } // drop
            24 => { let (a, b) = self.pop2()?; self.stack.push(a + b); } // add
            26 => { let v = self.pop1()?; self.stack.push(v.sqrt()); }
            20 => { // put
                let (val, idx) = self.pop2()?;
                let idx = idx as usize % 32;
                self.transient[idx] = val;
            }
            21 => { // get
                let idx = self.pop1()? as usize % 32;
                self.stack.push(self.transient[idx]);
            }
            _ => {
                self.stack.clear();
            }
        }
        Ok(())
    }

    fn arg(&self, i: usize) -> f64 {
        *self.stack.get(i).unwrap_or(&0.0)
    }

    fn pop1(&mut self) -> Result<f64, PSError> {
        self.stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, "show", "Type 2 charstring stack underflow"))
    }

    fn pop2(&mut self) -> Result<(f64, f64), PSError> {
        let b = self.pop1()?;
        let a = self.pop1()?;
        Ok((a, b))
    }

    fn move_rel(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        self.builder.move_to(self.x, self.y);
        self.stack.clear();
    }

    fn line_rel(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        self.builder.line_to(self.x, self.y);
    }

    fn curve_rel(&mut self, dx1: f64, dy1: f64, dx2: f64, dy2: f64, dx3: f64, dy3: f64) {
        let x1 = self.x + dx1;
        let y1 = self.y + dy1;
        let x2 = x1 + dx2;
        let y2 = y1 + dy2;
        let x3 = x2 + dx3;
        let y3 = y2 + dy3;
        self.builder.curve_to(x1, y1, x2, y2, x3, y3);
        self.x = x3;
        self.y = y3;
    }

    fn vvcurveto(&mut self) {
        let mut args = self.stack.split_off(0);
        let mut dx1 = 0.0;
        if args.len() % 4 == 1 {
            dx1 = args.remove(0);
        }
        for (n, four) in args.chunks(4).enumerate() {
            if four.len() != 4 {
                continue;
            }
            let first_dx = if n == 0 { dx1 } else { 0.0 };
            self.curve_rel(first_dx, four[0], four[1], four[2], 0.0, four[3]);
        }
    }

    fn hhcurveto(&mut self) {
        let mut args = self.stack.split_off(0);
        let mut dy1 = 0.0;
        if args.len() % 4 == 1 {
            dy1 = args.remove(0);
        }
        for (n, four) in args.chunks(4).enumerate() {
            if four.len() != 4 {
                continue;
            }
            let first_dy = if n == 0 { dy1 } else { 0.0 };
            self.curve_rel(four[0], first_dy, four[1], four[2], four[3], 0.0);
        }
    }

    /// `vhcurveto` (`start_vertical = true`) / `hvcurveto` (`false`),
    /// including the optional final single-argument tangent adjustment.
    fn vhcurveto(&mut self, mut start_vertical: bool) {
        let args = self.stack.split_off(0);
        let n = args.len();
        let mut idx = 0;
        while idx + 4 <= n {
            let last = idx + 4 == n - 1;
            let five = if last { args[idx + 4] } else { 0.0 };
            if start_vertical {
                self.curve_rel(0.0, args[idx], args[idx + 1], args[idx + 2], args[idx + 3], if last { five } else { 0.0 });
            } else {
                self.curve_rel(args[idx], 0.0, args[idx + 1], args[idx + 2], if last { five } else { 0.0 }, args[idx + 3]);
            }
            idx += 4;
            start_vertical = !start_vertical;
        }
    }

    /// `flex`: 13 args, two curves, last arg is flex depth (ignored by a
    /// path-only consumer — depth only matters to hint-quality renderers).
    fn flex(&mut self) {
        let a = self.stack.split_off(0);
        if a.len() < 13 {
            return;
        }
        self.curve_rel(a[0], a[1], a[2], a[3], a[4], a[5]);
        self.curve_rel(a[6], a[7], a[8], a[9], a[10], a[11]);
    }

    fn hflex(&mut self) {
        let a = self.stack.split_off(0);
        if a.len() < 7 {
            return;
        }
        let y0 = self.y;
        self.curve_rel(a[0], 0.0, a[1], a[2], a[3], 0.0);
        self.curve_rel(a[4], 0.0, a[5], y0 - self.y, a[6], 0.0);
    }

    fn hflex1(&mut self) {
        let a = self.stack.split_off(0);
        if a.len() < 9 {
            return;
        }
        let y0 = self.y;
        self.curve_rel(a[0], a[1], a[2], a[3], a[4], 0.0);
        self.curve_rel(a[5], 0.0, a[6], a[7], a[8], y0 - self.y - a[1] - a[3] - a[7]);
    }

    fn flex1(&mut self) {
        let a = self.stack.split_off(0);
        if a.len() < 11 {
            return;
        }
        let (x0, y0) = (self.x, self.y);
        self.curve_rel(a[0], a[1], a[2], a[3], a[4], a[5]);
        let dx_sum: f64 = [a[0], a[2], a[4], a[6], a[8]].iter().sum();
        let dy_sum: f64 = [a[1], a[3], a[5], a[7], a[9]].iter().sum();
        if dx_sum.abs() > dy_sum.abs() {
            self.curve_rel(a[6], a[7], a[8], a[9], a[10], y0 - (self.y + a[7] + a[9]));
        } else {
            self.curve_rel(a[6], a[7], a[8], a[9], x0 - (self.x + a[6] + a[8]), a[10]);
        }
    }
}
