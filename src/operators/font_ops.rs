//! Font-dictionary construction and selection (§4.6 "Font dictionaries").
//!
//! `definefont` builds a native [`FontDict`] straight out of the
//! PostScript-level font dictionary the program hands it — the same
//! `/CharStrings`/`/Subrs`/`/Encoding`/`/CharProcs` keys a real Type 1 or
//! Type 3 font resource carries. Type 0/2/42 fonts (composite CID fonts, bare
//! CFF programs, TrueType `sfnt`s) arrive pre-parsed through a resource
//! loader rather than PostScript-level dict syntax, so `definefont` only
//! builds Type 1 and Type 3 programs; attempting the others raises
//! `unsupported` (documented in DESIGN.md).

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::fonts::{next_font_id, type3, FontDict, FontProgram, FontType};
use crate::matrix::Matrix;
use crate::object::{Object, PDict};

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "definefont", definefont);
    def(dict, "findfont", findfont);
    def(dict, "scalefont", scalefont);
    def(dict, "makefont", makefont);
    def(dict, "setfont", setfont);
    def(dict, "currentfont", currentfont);
    // Type 3 CharProcs call these directly (§4.6 "Type 3 fonts"); they live
    // in fonts::type3 since they populate ctx.pending_cache_device rather
    // than anything font-selection related, but are ordinary operators.
    def(dict, "setcachedevice", type3::setcachedevice);
    def(dict, "setcharwidth", type3::setcharwidth);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn dict_get(d: &PDict, key: &str) -> Option<Object> {
    d.map.borrow().get(key).cloned()
}

fn font_matrix_of(d: &PDict, cmd: &str) -> Result<Matrix, PSError> {
    match dict_get(d, "FontMatrix") {
        Some(Object::Array(a)) if a.length == 6 => {
            let v = a.to_vec();
            let mut out = [0.0; 6];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = v[i].as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "FontMatrix elements must be numbers"))?;
            }
            Ok(Matrix::from_array(out))
        }
        Some(_) => Err(err(ErrorKind::TypeCheck, cmd, "FontMatrix must be a 6-element array")),
        None => Ok(Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0)),
    }
}

fn encoding_of(d: &PDict) -> HashMap<u8, String> {
    let mut out = HashMap::new();
    if let Some(Object::Array(a)) = dict_get(d, "Encoding") {
        for (i, v) in a.to_vec().into_iter().enumerate().take(256) {
            if let Object::Name(n, _) = v {
                out.insert(i as u8, n.to_string());
            }
        }
    }
    out
}

fn build_type1(d: &PDict, cmd: &str) -> Result<FontProgram, PSError> {
    let Some(Object::Dict(cs)) = dict_get(d, "CharStrings") else {
        return Err(err(ErrorKind::InvalidFont, cmd, "missing /CharStrings"));
    };
    let mut char_strings = HashMap::new();
    for (name, v) in cs.map.borrow().iter() {
        let Object::String(s) = v else { return Err(err(ErrorKind::InvalidFont, cmd, "/CharStrings values must be strings")) };
        char_strings.insert(name.clone(), s.as_bytes());
    }
    let mut subrs = Vec::new();
    if let Some(Object::Array(a)) = dict_get(d, "Subrs") {
        for v in a.to_vec() {
            let Object::String(s) = v else { return Err(err(ErrorKind::InvalidFont, cmd, "/Subrs entries must be strings")) };
            subrs.push(s.as_bytes());
        }
    }
    let len_iv = match dict_get(d, "lenIV") {
        Some(v) => v.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "/lenIV must be an integer"))? as i32,
        None => 4,
    };
    Ok(FontProgram::Type1 { char_strings, subrs, len_iv, encoding: encoding_of(d) })
}

fn build_type3(d: &PDict, cmd: &str) -> Result<FontProgram, PSError> {
    let Some(Object::Dict(procs)) = dict_get(d, "CharProcs") else {
        return Err(err(ErrorKind::InvalidFont, cmd, "missing /CharProcs"));
    };
    let build_char_is_build_glyph = dict_get(d, "BuildGlyph").is_some();
    Ok(FontProgram::Type3 { char_procs: procs, build_char_is_build_glyph, encoding: encoding_of(d) })
}

/// `key font definefont font'` (§4.6): registers `font` (a PostScript
/// dictionary describing the program) under `key` in the font directory.
pub fn definefont(ctx: &mut Context) -> Result<(), PSError> {
    let Object::Dict(d) = pop(ctx, "definefont")? else { return Err(err(ErrorKind::TypeCheck, "definefont", "expected a font dictionary")) };
    let Object::Name(key, _) = pop(ctx, "definefont")? else { return Err(err(ErrorKind::TypeCheck, "definefont", "expected a name key")) };

    let font_type_num = dict_get(&d, "FontType").and_then(|v| v.as_i64()).ok_or_else(|| err(ErrorKind::InvalidFont, "definefont", "missing /FontType"))?;
    let (font_type, program) = match font_type_num {
        1 => (FontType::Type1, build_type1(&d, "definefont")?),
        3 => (FontType::Type3, build_type3(&d, "definefont")?),
        0 | 2 | 42 => return Err(err(ErrorKind::Unsupported, "definefont", "composite/outline font types must come from a resource loader, not a dict literal")),
        other => return Err(err(ErrorKind::InvalidFont, "definefont", format!("unknown FontType {}", other))),
    };

    let font_matrix = font_matrix_of(&d, "definefont")?;
    let font_name = match dict_get(&d, "FontName") {
        Some(Object::Name(n, _)) => Some(n.to_string()),
        _ => Some(key.to_string()),
    };
    let font_dict = FontDict { id: next_font_id(), font_type, font_matrix, font_name, program: std::rc::Rc::new(program), paint_type: 0 };
    let id = ctx.fonts.insert(font_dict);
    ctx.fonts.register_name(key.to_string(), id);
    ctx.operand_stack.push(Object::FontID(id));
    Ok(())
}

/// `key findfont font` (§4.6): looks up a previously `definefont`-registered
/// font by name.
pub fn findfont(ctx: &mut Context) -> Result<(), PSError> {
    let key = match pop(ctx, "findfont")? {
        Object::Name(n, _) => n.to_string(),
        Object::String(s) => s.to_utf8_lossy(),
        _ => return Err(err(ErrorKind::TypeCheck, "findfont", "expected a name or string")),
    };
    let id = ctx.fonts.find_by_name(&key).ok_or_else(|| err(ErrorKind::InvalidFont, "findfont", format!("/{} is not a known font", key)))?;
    ctx.operand_stack.push(Object::FontID(id));
    Ok(())
}

fn pop_font(ctx: &mut Context, cmd: &str) -> Result<std::rc::Rc<FontDict>, PSError> {
    let Object::FontID(id) = pop(ctx, cmd)? else { return Err(err(ErrorKind::TypeCheck, cmd, "expected a font")) };
    ctx.fonts.get(id).ok_or_else(|| err(ErrorKind::InvalidFont, cmd, "font no longer registered"))
}

/// `font scale scalefont font'` (§4.6): derives a new font whose `FontMatrix`
/// is uniformly scaled.
pub fn scalefont(ctx: &mut Context) -> Result<(), PSError> {
    let scale = pop(ctx, "scalefont")?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, "scalefont", "expected a number"))?;
    let font = pop_font(ctx, "scalefont")?;
    let derived = font.derive(Matrix::scale(scale, scale).concat(font.font_matrix));
    let id = ctx.fonts.insert(derived);
    ctx.operand_stack.push(Object::FontID(id));
    Ok(())
}

/// `font matrix makefont font'` (§4.6): derives a new font whose
/// `FontMatrix` is `matrix` composed with the original.
pub fn makefont(ctx: &mut Context) -> Result<(), PSError> {
    let Object::Array(a) = pop(ctx, "makefont")? else { return Err(err(ErrorKind::TypeCheck, "makefont", "expected a matrix array")) };
    if a.length != 6 {
        return Err(err(ErrorKind::RangeCheck, "makefont", "matrix array must have 6 elements"));
    }
    let v = a.to_vec();
    let mut m = [0.0; 6];
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = v[i].as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, "makefont", "matrix elements must be numbers"))?;
    }
    let font = pop_font(ctx, "makefont")?;
    let derived = font.derive(Matrix::from_array(m).concat(font.font_matrix));
    let id = ctx.fonts.insert(derived);
    ctx.operand_stack.push(Object::FontID(id));
    Ok(())
}

pub fn setfont(ctx: &mut Context) -> Result<(), PSError> {
    let Object::FontID(id) = pop(ctx, "setfont")? else { return Err(err(ErrorKind::TypeCheck, "setfont", "expected a font")) };
    ctx.current_font = Some(id);
    Ok(())
}

pub fn currentfont(ctx: &mut Context) -> Result<(), PSError> {
    let id = ctx.current_font.ok_or_else(|| err(ErrorKind::Undefined, "currentfont", "no current font"))?;
    ctx.operand_stack.push(Object::FontID(id));
    Ok(())
}
