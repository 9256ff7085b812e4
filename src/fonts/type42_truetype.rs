//! Type 42 (TrueType-flavored) fonts (§4.6 "Type 42 TrueType").
//!
//! The font program is the `sfnts` table directory embedded verbatim in the
//! PostScript font dictionary. This module parses just enough of it to walk
//! `loca`/`glyf` for simple and composite glyph outlines and `hmtx` for
//! advance widths, using `byteorder` for the big-endian table reads the way
//! the rest of this pack's binary-format parsers do.

use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Cursor;

use crate::error::{err, ErrorKind, PSError};
use crate::fonts::glyph_program::{quadratic_to_cubic, GlyphPathBuilder};
use crate::matrix::Matrix;

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    offset: u32,
    length: u32,
}

#[derive(Debug)]
pub struct TrueTypeFont {
    pub sfnts: Vec<u8>,
    pub units_per_em: u16,
    pub loca: Vec<u32>,
    pub glyf_offset: u32,
    pub glyf_length: u32,
    pub hmtx_advances: Vec<u16>,
    pub cmap_unicode: HashMap<u32, u16>,
    tables: HashMap<[u8; 4], TableEntry>,
}

impl TrueTypeFont {
    /// Parses the `sfnt` table directory plus `head`/`loca`/`hmtx`/`cmap`
    /// enough to resolve glyph outlines and advances. `glyf`/`loca` parsing
    /// is lazy per-glyph (`glyph_path`); only the directory and the small
    /// fixed-size tables are eagerly decoded here.
    pub fn parse(sfnts: Vec<u8>) -> Result<Self, PSError> {
        let bad = || err(ErrorKind::InvalidFont, "definefont", "malformed sfnt table directory");
        let mut cur = Cursor::new(&sfnts[..]);
        let _version = cur.read_u32::<BigEndian>().map_err(|_| bad())?;
        let num_tables = cur.read_u16::<BigEndian>().map_err(|_| bad())?;
        cur.set_position(cur.position() + 6); // searchRange, entrySelector, rangeShift

        let mut tables = HashMap::new();
        for _ in 0..num_tables {
            let mut tag = [0u8; 4];
            cur.read_exact(&mut tag).map_err(|_| bad())?;
            let _checksum = cur.read_u32::<BigEndian>().map_err(|_| bad())?;
            let offset = cur.read_u32::<BigEndian>().map_err(|_| bad())?;
            let length = cur.read_u32::<BigEndian>().map_err(|_| bad())?;
            tables.insert(tag, TableEntry { offset, length });
        }

        let head = *tables.get(b"head").ok_or_else(bad)?;
        let mut head_cur = Cursor::new(&sfnts[head.offset as usize..]);
        head_cur.set_position(18);
        let units_per_em = head_cur.read_u16::<BigEndian>().map_err(|_| bad())?;
        head_cur.set_position(50);
        let index_to_loc_format = head_cur.read_i16::<BigEndian>().map_err(|_| bad())?;

        let maxp = *tables.get(b"maxp").ok_or_else(bad)?;
        let mut maxp_cur = Cursor::new(&sfnts[maxp.offset as usize..]);
        maxp_cur.set_position(4);
        let num_glyphs = maxp_cur.read_u16::<BigEndian>().map_err(|_| bad())?;

        let loca_entry = *tables.get(b"loca").ok_or_else(bad)?;
        let mut loca_cur = Cursor::new(&sfnts[loca_entry.offset as usize..(loca_entry.offset + loca_entry.length) as usize]);
        let mut loca = Vec::with_capacity(num_glyphs as usize + 1);
        if index_to_loc_format == 0 {
            for _ in 0..=num_glyphs {
                loca.push(loca_cur.read_u16::<BigEndian>().map_err(|_| bad())? as u32 * 2);
            }
        } else {
            for _ in 0..=num_glyphs {
                loca.push(loca_cur.read_u32::<BigEndian>().map_err(|_| bad())?);
            }
        }

        let glyf = *tables.get(b"glyf").ok_or_else(bad)?;

        let hhea = *tables.get(b"hhea").ok_or_else(bad)?;
        let mut hhea_cur = Cursor::new(&sfnts[hhea.offset as usize..]);
        hhea_cur.set_position(34);
        let num_h_metrics = hhea_cur.read_u16::<BigEndian>().map_err(|_| bad())?;

        let mut hmtx_advances = Vec::new();
        if let Some(hmtx) = tables.get(b"hmtx") {
            let mut hmtx_cur = Cursor::new(&sfnts[hmtx.offset as usize..(hmtx.offset + hmtx.length) as usize]);
            for _ in 0..num_h_metrics {
                let advance = hmtx_cur.read_u16::<BigEndian>().map_err(|_| bad())?;
                let _lsb = hmtx_cur.read_i16::<BigEndian>().map_err(|_| bad())?;
                hmtx_advances.push(advance);
            }
        }

        let cmap_unicode = tables
            .get(b"cmap")
            .and_then(|entry| parse_cmap_unicode(&sfnts, *entry).ok())
            .unwrap_or_default();

        Ok(TrueTypeFont {
            sfnts,
            units_per_em: units_per_em.max(1),
            loca,
            glyf_offset: glyf.offset,
            glyf_length: glyf.length,
            hmtx_advances,
            cmap_unicode,
            tables,
        })
    }

    pub fn advance_width(&self, gid: u16) -> f64 {
        let advances = &self.hmtx_advances;
        if advances.is_empty() {
            return 0.0;
        }
        let idx = (gid as usize).min(advances.len() - 1);
        advances[idx] as f64
    }

    /// Builds the device-space outline for one glyph ID, recursing into
    /// composite-glyph components (§4.6).
    pub fn glyph_path(&self, gid: u16, font_matrix: Matrix, ctm: Matrix, origin: (f64, f64)) -> Result<crate::path::Path, PSError> {
        let scale = Matrix::scale(1.0 / self.units_per_em as f64, 1.0 / self.units_per_em as f64).concat(font_matrix);
        let mut builder = GlyphPathBuilder::new(scale, ctm, origin);
        self.emit_glyph(gid, &mut builder, Matrix::IDENTITY, 0)?;
        Ok(builder.finish())
    }

    fn emit_glyph(&self, gid: u16, builder: &mut GlyphPathBuilder, component_transform: Matrix, depth: u32) -> Result<(), PSError> {
        if depth > 8 {
            return Err(err(ErrorKind::LimitCheck, "show", "Type 42 composite glyph nesting too deep"));
        }
        let gid = gid as usize;
        if gid + 1 >= self.loca.len() {
            return Ok(()); // out-of-range GID renders as empty (.notdef fallback is the caller's job)
        }
        let start = self.glyf_offset + self.loca[gid];
        let end = self.glyf_offset + self.loca[gid + 1];
        if end <= start || end > self.glyf_offset + self.glyf_length {
            return Ok(()); // zero-length entry: no outline (e.g. space)
        }
        let data = &self.sfnts[start as usize..end as usize];
        let mut cur = Cursor::new(data);
        let num_contours = cur.read_i16::<BigEndian>().map_err(|_| err(ErrorKind::InvalidFont, "show", "truncated glyf entry"))?;
        cur.set_position(10);

        if num_contours >= 0 {
            self.emit_simple_glyph(&mut cur, num_contours as u16, builder, component_transform)
        } else {
            self.emit_composite_glyph(&mut cur, builder, component_transform, depth)
        }
    }

    fn emit_simple_glyph(
        &self,
        cur: &mut Cursor<&[u8]>,
        num_contours: u16,
        builder: &mut GlyphPathBuilder,
        xf: Matrix,
    ) -> Result<(), PSError> {
        let bad = || err(ErrorKind::InvalidFont, "show", "malformed simple glyph outline");
        let mut end_pts = Vec::with_capacity(num_contours as usize);
        for _ in 0..num_contours {
            end_pts.push(cur.read_u16::<BigEndian>().map_err(|_| bad())?);
        }
        let num_points = end_pts.last().map(|&e| e as usize + 1).unwrap_or(0);
        let instr_len = cur.read_u16::<BigEndian>().map_err(|_| bad())?;
        cur.set_position(cur.position() + instr_len as u64);

        let mut flags = Vec::with_capacity(num_points);
        while flags.len() < num_points {
            let f = cur.read_u8().map_err(|_| bad())?;
            flags.push(f);
            if f & 0x08 != 0 {
                let repeat = cur.read_u8().map_err(|_| bad())?;
                for _ in 0..repeat {
                    flags.push(f);
                }
            }
        }
        flags.truncate(num_points);

        let mut xs = Vec::with_capacity(num_points);
        let mut x = 0i32;
        for &f in &flags {
            if f & 0x02 != 0 {
                let dx = cur.read_u8().map_err(|_| bad())? as i32;
                x += if f & 0x10 != 0 { dx } else { -dx };
            } else if f & 0x10 == 0 {
                x += cur.read_i16::<BigEndian>().map_err(|_| bad())? as i32;
            }
            xs.push(x);
        }

        let mut ys = Vec::with_capacity(num_points);
        let mut y = 0i32;
        for &f in &flags {
            if f & 0x04 != 0 {
                let dy = cur.read_u8().map_err(|_| bad())? as i32;
                y += if f & 0x20 != 0 { dy } else { -dy };
            } else if f & 0x20 == 0 {
                y += cur.read_i16::<BigEndian>().map_err(|_| bad())? as i32;
            }
            ys.push(y);
        }

        let on_curve: Vec<bool> = flags.iter().map(|f| f & 0x01 != 0).collect();
        let points: Vec<(f64, f64)> = xs.iter().zip(ys.iter()).map(|(&x, &y)| xf.transform_point(x as f64, y as f64)).collect();

        let mut start = 0usize;
        for &end in &end_pts {
            let end = end as usize;
            emit_contour(&points[start..=end], &on_curve[start..=end], builder);
            start = end + 1;
        }
        Ok(())
    }

    fn emit_composite_glyph(&self, cur: &mut Cursor<&[u8]>, builder: &mut GlyphPathBuilder, parent_xf: Matrix, depth: u32) -> Result<(), PSError> {
        let bad = || err(ErrorKind::InvalidFont, "show", "malformed composite glyph");
        loop {
            let flags = cur.read_u16::<BigEndian>().map_err(|_| bad())?;
            let component_gid = cur.read_u16::<BigEndian>().map_err(|_| bad())?;

            let (dx, dy) = if flags & 0x0001 != 0 {
                (cur.read_i16::<BigEndian>().map_err(|_| bad())? as f64, cur.read_i16::<BigEndian>().map_err(|_| bad())? as f64)
            } else {
                (cur.read_i8().map_err(|_| bad())? as f64, cur.read_i8().map_err(|_| bad())? as f64)
            };

            let read_f2dot14 = |c: &mut Cursor<&[u8]>| -> Result<f64, PSError> {
                Ok(c.read_i16::<BigEndian>().map_err(|_| bad())? as f64 / 16384.0)
            };

            let (a, b, c, d) = if flags & 0x0008 != 0 {
                let s = read_f2dot14(cur)?;
                (s, 0.0, 0.0, s)
            } else if flags & 0x0040 != 0 {
                (read_f2dot14(cur)?, 0.0, 0.0, read_f2dot14(cur)?)
            } else if flags & 0x0080 != 0 {
                (read_f2dot14(cur)?, read_f2dot14(cur)?, read_f2dot14(cur)?, read_f2dot14(cur)?)
            } else {
                (1.0, 0.0, 0.0, 1.0)
            };

            let component_xf = Matrix::new(a, b, c, d, dx, dy).concat(parent_xf);
            self.emit_glyph(component_gid, builder, component_xf, depth + 1)?;

            if flags & 0x0020 == 0 {
                break; // MORE_COMPONENTS clear: last component
            }
        }
        Ok(())
    }
}

/// Emits one contour, converting off-curve quadratic control points (and the
/// implied on-curve midpoints between two consecutive off-curve points) to
/// cubic segments via [`quadratic_to_cubic`].
fn emit_contour(points: &[(f64, f64)], on_curve: &[bool], builder: &mut GlyphPathBuilder) {
    if points.is_empty() {
        return;
    }
    let n = points.len();
    let start_idx = on_curve.iter().position(|&b| b).unwrap_or(0);
    let start = if on_curve[start_idx] {
        points[start_idx]
    } else {
        midpoint(points[start_idx], points[(start_idx + n - 1) % n])
    };
    builder.move_to(start.0, start.1);

    let mut prev_on = start;
    let mut pending_off: Option<(f64, f64)> = None;
    for step in 1..=n {
        let idx = (start_idx + step) % n;
        let pt = points[idx];
        if on_curve[idx] {
            match pending_off.take() {
                Some(ctrl) => {
                    let (c1x, c1y, c2x, c2y, ex, ey) = quadratic_to_cubic(prev_on, ctrl, pt);
                    builder.curve_to(c1x, c1y, c2x, c2y, ex, ey);
                }
                None => builder.line_to(pt.0, pt.1),
            }
            prev_on = pt;
        } else if let Some(ctrl) = pending_off.replace(pt) {
            let implied = midpoint(ctrl, pt);
            let (c1x, c1y, c2x, c2y, ex, ey) = quadratic_to_cubic(prev_on, ctrl, implied);
            builder.curve_to(c1x, c1y, c2x, c2y, ex, ey);
            prev_on = implied;
        }
    }
    builder.close_path();
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// Decodes just enough of a format-4 (BMP, segment-mapped) `cmap` subtable
/// to resolve Unicode -> GID for text-based glyph lookup fallback.
fn parse_cmap_unicode(sfnts: &[u8], entry: TableEntry) -> Result<HashMap<u32, u16>, PSError> {
    let bad = || err(ErrorKind::InvalidFont, "definefont", "malformed cmap table");
    let base = entry.offset as usize;
    let mut cur = Cursor::new(&sfnts[base..(base + entry.length as usize)]);
    let _version = cur.read_u16::<BigEndian>().map_err(|_| bad())?;
    let num_tables = cur.read_u16::<BigEndian>().map_err(|_| bad())?;

    let mut best_offset = None;
    for _ in 0..num_tables {
        let platform_id = cur.read_u16::<BigEndian>().map_err(|_| bad())?;
        let encoding_id = cur.read_u16::<BigEndian>().map_err(|_| bad())?;
        let offset = cur.read_u32::<BigEndian>().map_err(|_| bad())?;
        if (platform_id == 3 && (encoding_id == 1 || encoding_id == 10)) || platform_id == 0 {
            best_offset = Some(offset);
        }
    }
    let Some(offset) = best_offset else { return Ok(HashMap::new()) };

    let mut sub = Cursor::new(&sfnts[base + offset as usize..]);
    let format = sub.read_u16::<BigEndian>().map_err(|_| bad())?;
    if format != 4 {
        return Ok(HashMap::new());
    }
    let _length = sub.read_u16::<BigEndian>().map_err(|_| bad())?;
    let _language = sub.read_u16::<BigEndian>().map_err(|_| bad())?;
    let seg_x2 = sub.read_u16::<BigEndian>().map_err(|_| bad())?;
    let seg_count = seg_x2 as usize / 2;
    sub.set_position(sub.position() + 6); // searchRange, entrySelector, rangeShift

    let mut end_codes = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        end_codes.push(sub.read_u16::<BigEndian>().map_err(|_| bad())?);
    }
    sub.set_position(sub.position() + 2); // reservedPad
    let mut start_codes = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        start_codes.push(sub.read_u16::<BigEndian>().map_err(|_| bad())?);
    }
    let mut id_deltas = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        id_deltas.push(sub.read_i16::<BigEndian>().map_err(|_| bad())?);
    }
    let id_range_offset_pos = sub.position();
    let mut id_range_offsets = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        id_range_offsets.push(sub.read_u16::<BigEndian>().map_err(|_| bad())?);
    }

    let mut map = HashMap::new();
    for seg in 0..seg_count {
        let start = start_codes[seg];
        let end = end_codes[seg];
        if start == 0xFFFF && end == 0xFFFF {
            continue;
        }
        for code in start..=end {
            let gid = if id_range_offsets[seg] == 0 {
                (code as i32 + id_deltas[seg] as i32) as u16
            } else {
                let glyph_index_addr = id_range_offset_pos
                    + (seg as u64) * 2
                    + id_range_offsets[seg] as u64
                    + (code - start) as u64 * 2;
                let mut gidx_cur = Cursor::new(&sfnts[base..(base + entry.length as usize)]);
                gidx_cur.set_position(glyph_index_addr);
                let raw = gidx_cur.read_u16::<BigEndian>().map_err(|_| bad())?;
                if raw == 0 {
                    0
                } else {
                    (raw as i32 + id_deltas[seg] as i32) as u16
                }
            };
            if gid != 0 {
                map.insert(code as u32, gid);
            }
        }
    }
    Ok(map)
}

use std::io::Read;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_is_average() {
        assert_eq!(midpoint((0.0, 0.0), (2.0, 4.0)), (1.0, 2.0));
    }
}
