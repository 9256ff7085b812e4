//! Text painting and metrics (§4.6 "show"-family operators).
//!
//! Glyph outlines come from the per-`FontType` charstring/outline
//! interpreters (Type 1, Type 2/CFF, Type 42 TrueType), Type 0 composite
//! fonts decode each code through their `CMap` to a descendant font first.
//! Each outline is cached at the path level by [`GlyphCacheKey`] — repeated
//! glyphs at the same scale emit a `GlyphRef` instead of rebuilding and
//! re-filling an identical path (§4.6 "Glyph caching"). Type 3 glyphs have
//! no charstring: their `CharProc` is ordinary PostScript that paints
//! directly through the normal path/paint operators, so it runs through the
//! dispatch loop via [`engine::run_until_hard_return`] instead of producing
//! a cacheable outline.

use std::collections::HashMap;
use std::rc::Rc;

use crate::context::Context;
use crate::display_list::{DisplayRecord, WindingRule};
use crate::engine;
use crate::error::{err, ErrorKind, PSError};
use crate::fonts::{type1, type3, FontDict, FontProgram};
use crate::glyph_cache::{GlyphCacheKey, GlyphSelector};
use crate::object::{LoopHeader, LoopKind, Object, PString};
use crate::path::Path;

use super::def;
use super::path_ops::current_point_user_space;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "show", show);
    def(dict, "ashow", ashow);
    def(dict, "widthshow", widthshow);
    def(dict, "awidthshow", awidthshow);
    def(dict, "kshow", kshow);
    def(dict, "cshow", cshow);
    def(dict, "stringwidth", stringwidth);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_num(ctx: &mut Context, cmd: &str) -> Result<f64, PSError> {
    pop(ctx, cmd)?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))
}

fn pop_string(ctx: &mut Context, cmd: &str) -> Result<PString, PSError> {
    match pop(ctx, cmd)? {
        Object::String(s) => Ok(s),
        _ => Err(err(ErrorKind::TypeCheck, cmd, "expected a string")),
    }
}

fn current_font(ctx: &Context, cmd: &str) -> Result<Rc<FontDict>, PSError> {
    let id = ctx.current_font.ok_or_else(|| err(ErrorKind::Undefined, cmd, "no current font"))?;
    ctx.fonts.get(id).ok_or_else(|| err(ErrorKind::InvalidFont, cmd, "current font no longer registered"))
}

fn glyph_name_for_code(encoding: &HashMap<u8, String>, code: u8, cmd: &str) -> Result<String, PSError> {
    encoding.get(&code).cloned().ok_or_else(|| err(ErrorKind::InvalidFont, cmd, format!("no glyph for character code {}", code)))
}

/// One glyph's device-space outline plus its text-space advance, or `None`
/// for the outline when a Type 3 `CharProc` painted directly instead of
/// producing something cacheable. `origin` is the text-space point (pre-CTM)
/// the glyph sits at.
fn build_glyph(ctx: &mut Context, font: &FontDict, code: u8, origin: (f64, f64)) -> Result<(Option<Path>, (f64, f64)), PSError> {
    let ctm = ctx.gstate().ctm;
    let ctm4 = {
        let a = ctm.to_array();
        [a[0], a[1], a[2], a[3]]
    };
    let fm4 = {
        let a = font.font_matrix.to_array();
        [a[0], a[1], a[2], a[3]]
    };

    match &*font.program {
        FontProgram::Type1 { char_strings, subrs, len_iv, encoding } => {
            let name = glyph_name_for_code(encoding, code, "show")?;
            let key = GlyphCacheKey::for_path(font.identity_key(), GlyphSelector::Name(name.clone()), &ctm4, &fm4);
            if let Some((path, advance)) = ctx.path_cache.get(&key) {
                return Ok((Some(path.clone()), *advance));
            }
            let interp = type1::Type1Interpreter::new(char_strings, subrs, *len_iv, font.font_matrix, ctm, origin);
            let (path, glyph_space_advance) = interp.run(&name)?;
            let advance = font.font_matrix.transform_delta(glyph_space_advance.0, glyph_space_advance.1);
            ctx.path_cache.put(key, path.clone(), advance);
            Ok((Some(path), advance))
        }
        FontProgram::Type2(cff) => {
            let name = format!("g{}", code);
            let key = GlyphCacheKey::for_path(font.identity_key(), GlyphSelector::Code(code), &ctm4, &fm4);
            if let Some((path, advance)) = ctx.path_cache.get(&key) {
                return Ok((Some(path.clone()), *advance));
            }
            let interp = crate::fonts::cff_type2::Type2Interpreter::new(cff, font.font_matrix, ctm, origin);
            let path = interp.run(&name)?;
            // `Type2Interpreter::run` consumes `self`, so re-derive the width
            // the same pass already computed by constructing a throwaway
            // interpreter is wasteful; instead read it back off the font's
            // default/nominal width convention directly (rare path: bare CFF
            // programs only arrive through a resource loader, never through
            // `definefont`).
            let advance = font.font_matrix.transform_delta(cff.default_width_x, 0.0);
            ctx.path_cache.put(key, path.clone(), advance);
            Ok((Some(path), advance))
        }
        FontProgram::Type3 { char_procs, build_char_is_build_glyph, encoding } => {
            let name = glyph_name_for_code(encoding, code, "show")?;
            let proc = char_procs.get(&name).ok_or_else(|| err(ErrorKind::InvalidFont, "show", format!("no CharProc for /{}", name)))?;
            let selector = if *build_char_is_build_glyph { Object::literal_name(&name) } else { Object::Integer(code as i64) };
            let font_id = ctx.current_font.expect("current_font set by caller");
            type3::schedule_build(ctx, Object::FontID(font_id), selector, proc);
            engine::run_until_hard_return(ctx)?;
            let device = ctx.pending_cache_device.take().ok_or_else(|| err(ErrorKind::InvalidFont, "show", "CharProc never called setcachedevice/setcharwidth"))?;
            Ok((None, (device.wx, device.wy)))
        }
        FontProgram::Type42(tt) => {
            let gid = tt.cmap_unicode.get(&(code as u32)).copied().unwrap_or(code as u16);
            let key = GlyphCacheKey::for_path(font.identity_key(), GlyphSelector::Gid(gid as u32), &ctm4, &fm4);
            if let Some((path, advance)) = ctx.path_cache.get(&key) {
                return Ok((Some(path.clone()), *advance));
            }
            let path = tt.glyph_path(gid, font.font_matrix, ctm, origin)?;
            let scale = crate::matrix::Matrix::scale(1.0 / tt.units_per_em as f64, 1.0 / tt.units_per_em as f64).concat(font.font_matrix);
            let advance = scale.transform_delta(tt.advance_width(gid), 0.0);
            ctx.path_cache.put(key, path.clone(), advance);
            Ok((Some(path), advance))
        }
        FontProgram::Type0 { cmap, descendants } => {
            let decoded = cmap.decode(&[code]);
            let Some(&(cid, _)) = decoded.first() else {
                return Ok((None, (0.0, 0.0)));
            };
            let descendant_id = descendants.first().copied().ok_or_else(|| err(ErrorKind::InvalidFont, "show", "composite font has no descendant"))?;
            let descendant = ctx.fonts.get(descendant_id).ok_or_else(|| err(ErrorKind::InvalidFont, "show", "descendant font no longer registered"))?;
            build_glyph_by_gid(ctx, &descendant, cid, origin)
        }
    }
}

/// The Type 0 / CID-keyed path: selects a glyph by GID/CID rather than by
/// character code, used for descendant `Type2`/`Type42` programs reached
/// through a composite font's `CMap`.
fn build_glyph_by_gid(ctx: &mut Context, font: &FontDict, gid: u32, origin: (f64, f64)) -> Result<(Option<Path>, (f64, f64)), PSError> {
    let ctm = ctx.gstate().ctm;
    let ctm4 = { let a = ctm.to_array(); [a[0], a[1], a[2], a[3]] };
    let fm4 = { let a = font.font_matrix.to_array(); [a[0], a[1], a[2], a[3]] };
    match &*font.program {
        FontProgram::Type42(tt) => {
            let key = GlyphCacheKey::for_path(font.identity_key(), GlyphSelector::Gid(gid), &ctm4, &fm4);
            if let Some((path, advance)) = ctx.path_cache.get(&key) {
                return Ok((Some(path.clone()), *advance));
            }
            let path = tt.glyph_path(gid as u16, font.font_matrix, ctm, origin)?;
            let scale = crate::matrix::Matrix::scale(1.0 / tt.units_per_em as f64, 1.0 / tt.units_per_em as f64).concat(font.font_matrix);
            let advance = scale.transform_delta(tt.advance_width(gid as u16), 0.0);
            ctx.path_cache.put(key, path.clone(), advance);
            Ok((Some(path), advance))
        }
        FontProgram::Type2(cff) => {
            let name = format!("cid{}", gid);
            let key = GlyphCacheKey::for_path(font.identity_key(), GlyphSelector::Gid(gid), &ctm4, &fm4);
            if let Some((path, advance)) = ctx.path_cache.get(&key) {
                return Ok((Some(path.clone()), *advance));
            }
            let interp = crate::fonts::cff_type2::Type2Interpreter::new(cff, font.font_matrix, ctm, origin);
            let path = interp.run(&name)?;
            let advance = font.font_matrix.transform_delta(cff.default_width_x, 0.0);
            ctx.path_cache.put(key, path.clone(), advance);
            Ok((Some(path), advance))
        }
        _ => Err(err(ErrorKind::InvalidFont, "show", "composite font descendant must be Type 2 or Type 42")),
    }
}

/// Paints one glyph at the current point and returns the text-space advance
/// to move the current point by. Emits `GlyphStart`/`Path`/`Fill`/`GlyphEnd`
/// on a path-cache miss, `GlyphRef` on a hit; Type 3 glyphs paint themselves
/// via their `CharProc` and emit nothing here.
fn paint_glyph(ctx: &mut Context, code: u8) -> Result<(f64, f64), PSError> {
    let font = current_font(ctx, "show")?;
    let origin = current_point_user_space(ctx, "show")?;
    let ctm = ctx.gstate().ctm;

    let (path, advance) = build_glyph(ctx, &font, code, origin)?;
    if let Some(path) = path {
        let device_pos = ctm.transform_point(origin.0, origin.1);
        let color = ctx.current_color;
        ctx.display_list.push(DisplayRecord::GlyphStart { key: glyph_key_for(&font, code, ctm), position: device_pos });
        ctx.display_list.push(DisplayRecord::Path(path));
        ctx.display_list.push(DisplayRecord::Fill { color, rule: WindingRule::NonZero });
        ctx.display_list.push(DisplayRecord::GlyphEnd);
    }
    Ok(advance)
}

/// Rebuilds the same fingerprint `build_glyph` used for a direct (non-Type 0)
/// font, purely for the `GlyphStart` display-list record — cheap relative to
/// the outline construction it accompanies.
fn glyph_key_for(font: &FontDict, code: u8, ctm: crate::matrix::Matrix) -> GlyphCacheKey {
    let fm_a = font.font_matrix.to_array();
    let fm4 = [fm_a[0], fm_a[1], fm_a[2], fm_a[3]];
    let ctm_a = ctm.to_array();
    let ctm4 = [ctm_a[0], ctm_a[1], ctm_a[2], ctm_a[3]];
    let selector = match &*font.program {
        FontProgram::Type1 { encoding, .. } | FontProgram::Type3 { encoding, .. } => {
            GlyphSelector::Name(encoding.get(&code).cloned().unwrap_or_else(|| format!("code{}", code)))
        }
        FontProgram::Type2(_) => GlyphSelector::Code(code),
        FontProgram::Type42(tt) => GlyphSelector::Gid(tt.cmap_unicode.get(&(code as u32)).copied().unwrap_or(code as u16) as u32),
        FontProgram::Type0 { .. } => GlyphSelector::Code(code),
    };
    GlyphCacheKey::for_path(font.identity_key(), selector, &ctm4, &fm4)
}

fn advance_point(ctx: &mut Context, dx: f64, dy: f64) -> Result<(), PSError> {
    let (cx, cy) = current_point_user_space(ctx, "show")?;
    let (ux, uy) = ctx.gstate().ctm.transform_point(cx + dx, cy + dy);
    ctx.gstate_mut().path.move_to(ux, uy);
    Ok(())
}

/// Shared body for `show`/`ashow`/`widthshow`/`awidthshow`: paints every byte
/// of `bytes` in turn, advancing the current point by the glyph's own width
/// plus whatever extra user-space displacement applies to it.
fn show_bytes(ctx: &mut Context, bytes: &[u8], extra: (f64, f64), match_code: Option<u8>, match_extra: (f64, f64)) -> Result<(), PSError> {
    for &code in bytes {
        let (dx, dy) = paint_glyph(ctx, code)?;
        let mut total = (dx + extra.0, dy + extra.1);
        if match_code == Some(code) {
            total.0 += match_extra.0;
            total.1 += match_extra.1;
        }
        advance_point(ctx, total.0, total.1)?;
    }
    Ok(())
}

/// `string show -` (§4.6).
pub fn show(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "show")?;
    show_bytes(ctx, &s.as_bytes(), (0.0, 0.0), None, (0.0, 0.0))
}

/// `ax ay string ashow -` (§4.6): adds a uniform extra displacement to every
/// glyph's own advance.
pub fn ashow(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "ashow")?;
    let ay = pop_num(ctx, "ashow")?;
    let ax = pop_num(ctx, "ashow")?;
    show_bytes(ctx, &s.as_bytes(), (ax, ay), None, (0.0, 0.0))
}

/// `cx cy char string widthshow -` (§4.6): adds extra displacement only to
/// glyphs whose character code equals `char` (used to widen, e.g., spaces).
pub fn widthshow(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "widthshow")?;
    let char_code = pop_num(ctx, "widthshow")? as i64;
    let cy = pop_num(ctx, "widthshow")?;
    let cx = pop_num(ctx, "widthshow")?;
    if !(0..=255).contains(&char_code) {
        return Err(err(ErrorKind::RangeCheck, "widthshow", "character code out of range"));
    }
    show_bytes(ctx, &s.as_bytes(), (0.0, 0.0), Some(char_code as u8), (cx, cy))
}

/// `cx cy char ax ay string awidthshow -` (§4.6): combines `ashow`'s uniform
/// displacement with `widthshow`'s per-matching-code displacement.
pub fn awidthshow(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "awidthshow")?;
    let ay = pop_num(ctx, "awidthshow")?;
    let ax = pop_num(ctx, "awidthshow")?;
    let char_code = pop_num(ctx, "awidthshow")? as i64;
    let cy = pop_num(ctx, "awidthshow")?;
    let cx = pop_num(ctx, "awidthshow")?;
    if !(0..=255).contains(&char_code) {
        return Err(err(ErrorKind::RangeCheck, "awidthshow", "character code out of range"));
    }
    show_bytes(ctx, &s.as_bytes(), (ax, ay), Some(char_code as u8), (cx, cy))
}

/// `proc string kshow -` (§4.6): paints the string exactly as `show` does,
/// then separately drives `proc` once between each adjacent pair of
/// character codes via the `KShow` loop header so user code can read the
/// kerning context (the codes on either side of the gap); a deliberate
/// simplification is that `proc`'s own current-point adjustments take effect
/// only for whatever runs after `kshow` returns, not retroactively on the
/// glyphs this call already painted.
pub fn kshow(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "kshow")?;
    let proc = pop(ctx, "kshow")?;
    show_bytes(ctx, &s.as_bytes(), (0.0, 0.0), None, (0.0, 0.0))?;
    if s.length >= 2 {
        ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader {
            kind: LoopKind::KShow { string: s, cursor: 0 },
            proc,
            saved_font: ctx.current_font,
        })));
    }
    Ok(())
}

/// `proc string cshow -` (§4.6): invokes `proc` once per character code,
/// pushing only the code (no drawing — `cshow` is purely for custom
/// metrics/rendering callbacks, per its glossary entry).
pub fn cshow(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "cshow")?;
    let proc = pop(ctx, "cshow")?;
    ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader {
        kind: LoopKind::CShow { string: s, cursor: 0 },
        proc,
        saved_font: ctx.current_font,
    })));
    Ok(())
}

/// `string stringwidth wx wy` (§4.6): the total advance `show` would apply,
/// without painting anything or disturbing the current point.
pub fn stringwidth(ctx: &mut Context) -> Result<(), PSError> {
    let s = pop_string(ctx, "stringwidth")?;
    let font = current_font(ctx, "stringwidth")?;
    let origin = current_point_user_space(ctx, "stringwidth")?;
    let mut total = (0.0, 0.0);
    for &code in &s.as_bytes() {
        let saved_display_len = ctx.display_list.records.len();
        let saved_cache_device = ctx.pending_cache_device;
        let (path, advance) = build_glyph(ctx, &font, code, (origin.0 + total.0, origin.1 + total.1))?;
        // build_glyph never pushes to the display list itself (only
        // `paint_glyph` does), but a Type 3 CharProc reached through it may
        // have painted directly; discard whatever it drew, since
        // `stringwidth` must not paint.
        ctx.display_list.records.truncate(saved_display_len);
        ctx.pending_cache_device = saved_cache_device;
        let _ = path;
        total.0 += advance.0;
        total.1 += advance.1;
    }
    ctx.operand_stack.push(Object::Real(total.0));
    ctx.operand_stack.push(Object::Real(total.1));
    Ok(())
}
