//! String allocation, searching, and type-conversion operators (§4.1).
//!
//! `length`/`get`/`put`/`getinterval`/`putinterval`/`copy` on strings are
//! handled generically in `array_ops`/`stack_ops`; this module covers
//! allocation, `search`/`anchorsearch`, and the `cv*` conversions.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::{Object, PString};
use crate::vm::register_new;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "string", string);
    def(dict, "search", search);
    def(dict, "anchorsearch", anchorsearch);
    def(dict, "cvi", cvi);
    def(dict, "cvr", cvr);
    def(dict, "cvn", cvn);
    def(dict, "cvs", cvs);
    def(dict, "cvx", cvx);
    def(dict, "cvlit", cvlit);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

pub fn string(ctx: &mut Context) -> Result<(), PSError> {
    let n = pop(ctx, "string")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "string", "expected an integer"))?;
    if n < 0 {
        return Err(err(ErrorKind::RangeCheck, "string", "negative length"));
    }
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    let s = PString::new(vec![0u8; n as usize], is_global);
    register_new(ctx, s.header.timestamp, is_global);
    ctx.operand_stack.push(Object::String(s));
    Ok(())
}

/// `string seek search bool post match pre` / `string seek search false`
/// (§4.1 glossary "search"): finds the first occurrence of `seek` in
/// `string`, splitting around it on success.
pub fn search(ctx: &mut Context) -> Result<(), PSError> {
    let seek = pop(ctx, "search")?;
    let haystack = pop(ctx, "search")?;
    let (Object::String(seek), Object::String(haystack)) = (&seek, &haystack) else {
        return Err(err(ErrorKind::TypeCheck, "search", "expected two strings"));
    };
    let hay = haystack.as_bytes();
    let needle = seek.as_bytes();
    if needle.is_empty() {
        ctx.operand_stack.push(Object::String(haystack.clone()));
        ctx.operand_stack.push(Object::Boolean(false));
        return Ok(());
    }
    match hay.windows(needle.len()).position(|w| w == needle.as_slice()) {
        Some(pos) => {
            ctx.operand_stack.push(Object::String(haystack.slice(0, pos)));
            ctx.operand_stack.push(Object::String(haystack.slice(pos, needle.len())));
            ctx.operand_stack.push(Object::String(haystack.slice(pos + needle.len(), hay.len() - pos - needle.len())));
            ctx.operand_stack.push(Object::Boolean(true));
        }
        None => {
            ctx.operand_stack.push(Object::String(haystack.clone()));
            ctx.operand_stack.push(Object::Boolean(false));
        }
    }
    Ok(())
}

/// `string seek anchorsearch bool post match` / `string seek anchorsearch
/// false` (§4.1): like `search` but only matches at the start of `string`.
pub fn anchorsearch(ctx: &mut Context) -> Result<(), PSError> {
    let seek = pop(ctx, "anchorsearch")?;
    let haystack = pop(ctx, "anchorsearch")?;
    let (Object::String(seek), Object::String(haystack)) = (&seek, &haystack) else {
        return Err(err(ErrorKind::TypeCheck, "anchorsearch", "expected two strings"));
    };
    let hay = haystack.as_bytes();
    let needle = seek.as_bytes();
    if hay.starts_with(needle.as_slice()) {
        ctx.operand_stack.push(Object::String(haystack.slice(needle.len(), hay.len() - needle.len())));
        ctx.operand_stack.push(Object::String(haystack.slice(0, needle.len())));
        ctx.operand_stack.push(Object::Boolean(true));
    } else {
        ctx.operand_stack.push(Object::String(haystack.clone()));
        ctx.operand_stack.push(Object::Boolean(false));
    }
    Ok(())
}

/// `string cvi int` / `num cvi int` (§4.1 glossary "cvi"): truncates toward
/// zero.
pub fn cvi(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "cvi")?;
    let n = match v {
        Object::Integer(i) => i,
        Object::Real(r) => r.trunc() as i64,
        Object::String(s) => parse_number(&s.to_utf8_lossy(), "cvi")?.trunc() as i64,
        _ => return Err(err(ErrorKind::TypeCheck, "cvi", "unsupported operand type")),
    };
    ctx.operand_stack.push(Object::Integer(n));
    Ok(())
}

pub fn cvr(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "cvr")?;
    let n = match v {
        Object::Integer(i) => i as f64,
        Object::Real(r) => r,
        Object::String(s) => parse_number(&s.to_utf8_lossy(), "cvr")?,
        _ => return Err(err(ErrorKind::TypeCheck, "cvr", "unsupported operand type")),
    };
    ctx.operand_stack.push(Object::Real(n));
    Ok(())
}

fn parse_number(tok: &str, cmd: &str) -> Result<f64, PSError> {
    tok.trim().parse::<f64>().map_err(|_| err(ErrorKind::SyntaxError, cmd, "not a number"))
}

/// `string cvn name` (§4.1 glossary "cvn"): interns the string's bytes as a
/// literal name.
pub fn cvn(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "cvn")?;
    let Object::String(s) = v else { return Err(err(ErrorKind::TypeCheck, "cvn", "expected a string")) };
    ctx.operand_stack.push(Object::literal_name(&s.to_utf8_lossy()));
    Ok(())
}

/// `any string cvs substring` (§4.1 glossary "cvs"): writes `any`'s
/// canonical textual representation into `string` and returns the written
/// prefix.
pub fn cvs(ctx: &mut Context) -> Result<(), PSError> {
    let dest = pop(ctx, "cvs")?;
    let any = pop(ctx, "cvs")?;
    let Object::String(dest) = dest else { return Err(err(ErrorKind::TypeCheck, "cvs", "expected a destination string")) };
    let text = format!("{}", any);
    let bytes = text.as_bytes();
    if bytes.len() > dest.length {
        return Err(err(ErrorKind::RangeCheck, "cvs", "destination string too short"));
    }
    crate::vm::cow_check_string(ctx, &dest);
    {
        let mut backing = dest.buffer.borrow_mut();
        for (i, b) in bytes.iter().enumerate() {
            backing[dest.start + i] = *b;
        }
    }
    ctx.operand_stack.push(Object::String(dest.slice(0, bytes.len())));
    Ok(())
}

/// `any cvx any` (§4.1): marks a name or procedure executable.
pub fn cvx(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "cvx")?;
    let result = match v {
        Object::Name(n, _) => Object::Name(n, crate::object::Attr::Executable),
        Object::Array(mut a) => {
            a.attr = crate::object::Attr::Executable;
            Object::Array(a)
        }
        other => other,
    };
    ctx.operand_stack.push(result);
    Ok(())
}

/// `any cvlit any` (§4.1): the inverse of `cvx`, marks a name or procedure
/// literal.
pub fn cvlit(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "cvlit")?;
    let result = match v {
        Object::Name(n, _) => Object::Name(n, crate::object::Attr::Literal),
        Object::Array(mut a) => {
            a.attr = crate::object::Attr::Literal;
            Object::Array(a)
        }
        other => other,
    };
    ctx.operand_stack.push(result);
    Ok(())
}
