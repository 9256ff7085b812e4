//! Operand-stack manipulation operators (§4.1).

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::Object;
use crate::stacks::{check_pop, MAX_OPERAND_STACK};
use crate::vm::{cow_check_array, cow_check_dict, cow_check_string};

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "pop", pop);
    def(dict, "exch", exch);
    def(dict, "dup", dup);
    def(dict, "copy", copy);
    def(dict, "index", index);
    def(dict, "roll", roll);
    def(dict, "clear", clear);
    def(dict, "count", count);
    def(dict, "mark", mark);
    def(dict, "cleartomark", cleartomark);
    def(dict, "counttomark", counttomark);
}

fn pop_checked(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    check_pop(ctx.operand_stack.is_empty(), cmd, ErrorKind::StackUnderflow)?;
    Ok(ctx.operand_stack.pop().unwrap())
}

pub fn pop(ctx: &mut Context) -> Result<(), PSError> {
    pop_checked(ctx, "pop")?;
    Ok(())
}

pub fn exch(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop_checked(ctx, "exch")?;
    let a = pop_checked(ctx, "exch")?;
    ctx.operand_stack.push(b);
    ctx.operand_stack.push(a);
    Ok(())
}

pub fn dup(ctx: &mut Context) -> Result<(), PSError> {
    let top = ctx.operand_stack.last().cloned().ok_or_else(|| err(ErrorKind::StackUnderflow, "dup", "empty operand stack"))?;
    check_push(ctx, "dup")?;
    ctx.operand_stack.push(top);
    Ok(())
}

fn check_push(ctx: &Context, cmd: &str) -> Result<(), PSError> {
    crate::stacks::check_push(ctx.operand_stack.len(), MAX_OPERAND_STACK, cmd, ErrorKind::StackOverflow)
}

/// `copy`: overloaded across stack (`n copy`), array/packedarray/string/dict
/// forms (§4.1, glossary "copy"). Dispatches on the top operand's type.
pub fn copy(ctx: &mut Context) -> Result<(), PSError> {
    let top = ctx.operand_stack.last().cloned().ok_or_else(|| err(ErrorKind::StackUnderflow, "copy", "empty operand stack"))?;
    match top {
        Object::Integer(n) => {
            ctx.operand_stack.pop();
            if n < 0 {
                return Err(err(ErrorKind::RangeCheck, "copy", "negative count"));
            }
            let n = n as usize;
            if n > ctx.operand_stack.len() {
                return Err(err(ErrorKind::StackUnderflow, "copy", "not enough elements to copy"));
            }
            let start = ctx.operand_stack.len() - n;
            let slice: Vec<Object> = ctx.operand_stack[start..].to_vec();
            ctx.operand_stack.extend(slice);
            Ok(())
        }
        Object::Array(dest) => {
            ctx.operand_stack.pop();
            let src_obj = pop_checked(ctx, "copy")?;
            let Object::Array(src) = src_obj else { return Err(err(ErrorKind::TypeCheck, "copy", "expected array")) };
            if src.length > dest.length {
                return Err(err(ErrorKind::RangeCheck, "copy", "destination array too short"));
            }
            cow_check_array(ctx, &dest);
            let values = src.to_vec();
            let mut backing = dest.backing.borrow_mut();
            for (i, v) in values.into_iter().enumerate() {
                backing[dest.start + i] = v;
            }
            drop(backing);
            ctx.operand_stack.push(Object::Array(dest.slice(0, src.length)));
            Ok(())
        }
        Object::String(dest) => {
            ctx.operand_stack.pop();
            let src_obj = pop_checked(ctx, "copy")?;
            let Object::String(src) = src_obj else { return Err(err(ErrorKind::TypeCheck, "copy", "expected string")) };
            if src.length > dest.length {
                return Err(err(ErrorKind::RangeCheck, "copy", "destination string too short"));
            }
            cow_check_string(ctx, &dest);
            let bytes = src.as_bytes();
            let mut backing = dest.buffer.borrow_mut();
            for (i, b) in bytes.into_iter().enumerate() {
                backing[dest.start + i] = b;
            }
            drop(backing);
            ctx.operand_stack.push(Object::String(dest.slice(0, src.length)));
            Ok(())
        }
        Object::Dict(dest) => {
            ctx.operand_stack.pop();
            let src_obj = pop_checked(ctx, "copy")?;
            let Object::Dict(src) = src_obj else { return Err(err(ErrorKind::TypeCheck, "copy", "expected dict")) };
            cow_check_dict(ctx, &dest);
            let entries = src.map.borrow().clone();
            dest.map.borrow_mut().extend(entries);
            ctx.operand_stack.push(Object::Dict(dest));
            Ok(())
        }
        _ => Err(err(ErrorKind::TypeCheck, "copy", "unsupported operand type")),
    }
}

pub fn index(ctx: &mut Context) -> Result<(), PSError> {
    let n = pop_checked(ctx, "index")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "index", "expected integer"))?;
    if n < 0 {
        return Err(err(ErrorKind::RangeCheck, "index", "negative index"));
    }
    let n = n as usize;
    if n >= ctx.operand_stack.len() {
        return Err(err(ErrorKind::StackUnderflow, "index", "index beyond stack depth"));
    }
    let v = ctx.operand_stack[ctx.operand_stack.len() - 1 - n].clone();
    ctx.operand_stack.push(v);
    Ok(())
}

pub fn roll(ctx: &mut Context) -> Result<(), PSError> {
    let j = pop_checked(ctx, "roll")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "roll", "expected integer"))?;
    let n = pop_checked(ctx, "roll")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "roll", "expected integer"))?;
    if n < 0 {
        return Err(err(ErrorKind::RangeCheck, "roll", "negative count"));
    }
    let n = n as usize;
    if n > ctx.operand_stack.len() {
        return Err(err(ErrorKind::StackUnderflow, "roll", "not enough elements to roll"));
    }
    if n == 0 {
        return Ok(());
    }
    let start = ctx.operand_stack.len() - n;
    let slice = &mut ctx.operand_stack[start..];
    let shift = j.rem_euclid(n as i64) as usize;
    slice.rotate_right(shift);
    Ok(())
}

pub fn clear(ctx: &mut Context) -> Result<(), PSError> {
    ctx.operand_stack.clear();
    Ok(())
}

pub fn count(ctx: &mut Context) -> Result<(), PSError> {
    let n = ctx.operand_stack.len() as i64;
    ctx.operand_stack.push(Object::Integer(n));
    Ok(())
}

pub fn mark(ctx: &mut Context) -> Result<(), PSError> {
    check_push(ctx, "mark")?;
    ctx.operand_stack.push(Object::Mark);
    Ok(())
}

fn find_mark(ctx: &Context) -> Option<usize> {
    ctx.operand_stack.iter().rposition(|o| matches!(o, Object::Mark))
}

pub fn cleartomark(ctx: &mut Context) -> Result<(), PSError> {
    let pos = find_mark(ctx).ok_or_else(|| err(ErrorKind::UnmatchedMark, "cleartomark", "no mark on operand stack"))?;
    ctx.operand_stack.truncate(pos);
    Ok(())
}

pub fn counttomark(ctx: &mut Context) -> Result<(), PSError> {
    let pos = find_mark(ctx).ok_or_else(|| err(ErrorKind::UnmatchedMark, "counttomark", "no mark on operand stack"))?;
    let n = (ctx.operand_stack.len() - pos - 1) as i64;
    ctx.operand_stack.push(Object::Integer(n));
    Ok(())
}

// Referenced by array_ops/dict_ops/string_ops for the `[`/`]`/`<<`/`>>`
// mark-based constructors, registered here since they share `find_mark`.
pub(crate) fn pop_to_mark(ctx: &mut Context, cmd: &str) -> Result<Vec<Object>, PSError> {
    let pos = find_mark(ctx).ok_or_else(|| err(ErrorKind::UnmatchedMark, cmd, "no matching mark"))?;
    let items: Vec<Object> = ctx.operand_stack.split_off(pos + 1);
    ctx.operand_stack.pop(); // discard the mark itself
    Ok(items)
}
