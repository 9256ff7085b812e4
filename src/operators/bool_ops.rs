//! Boolean and bitwise operators (§4.1).

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::Object;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "eq", eq);
    def(dict, "ne", ne);
    def(dict, "gt", gt);
    def(dict, "ge", ge);
    def(dict, "lt", lt);
    def(dict, "le", le);
    def(dict, "and", and);
    def(dict, "or", or);
    def(dict, "xor", xor);
    def(dict, "not", not);
    def(dict, "bitshift", bitshift);
    def(dict, "true", push_true);
    def(dict, "false", push_false);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

/// Object equality for `eq`/`ne` (§4.1 glossary "eq"): numbers compare by
/// value across Integer/Real, strings by content, everything else by
/// object identity.
fn objects_equal(a: &Object, b: &Object) -> bool {
    match (a, b) {
        (Object::Integer(_) | Object::Real(_), Object::Integer(_) | Object::Real(_)) => a.as_f64() == b.as_f64(),
        (Object::Boolean(x), Object::Boolean(y)) => x == y,
        (Object::Null, Object::Null) => true,
        (Object::Name(x, _), Object::Name(y, _)) => x == y,
        (Object::String(x), Object::String(y)) => x.as_bytes() == y.as_bytes(),
        (Object::Array(x), Object::Array(y)) | (Object::PackedArray(x), Object::PackedArray(y)) => {
            std::rc::Rc::ptr_eq(&x.backing, &y.backing) && x.start == y.start && x.length == y.length
        }
        (Object::Dict(x), Object::Dict(y)) => std::rc::Rc::ptr_eq(&x.map, &y.map),
        (Object::FontID(x), Object::FontID(y)) => x == y,
        _ => false,
    }
}

pub fn eq(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop(ctx, "eq")?;
    let a = pop(ctx, "eq")?;
    ctx.operand_stack.push(Object::Boolean(objects_equal(&a, &b)));
    Ok(())
}

pub fn ne(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop(ctx, "ne")?;
    let a = pop(ctx, "ne")?;
    ctx.operand_stack.push(Object::Boolean(!objects_equal(&a, &b)));
    Ok(())
}

fn compare(ctx: &mut Context, cmd: &str) -> Result<std::cmp::Ordering, PSError> {
    let b = pop(ctx, cmd)?;
    let a = pop(ctx, cmd)?;
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "unordered comparison")),
        _ => match (&a, &b) {
            (Object::String(x), Object::String(y)) => Ok(x.as_bytes().cmp(&y.as_bytes())),
            _ => Err(err(ErrorKind::TypeCheck, cmd, "expected two numbers or two strings")),
        },
    }
}

pub fn gt(ctx: &mut Context) -> Result<(), PSError> {
    let ord = compare(ctx, "gt")?;
    ctx.operand_stack.push(Object::Boolean(ord.is_gt()));
    Ok(())
}

pub fn ge(ctx: &mut Context) -> Result<(), PSError> {
    let ord = compare(ctx, "ge")?;
    ctx.operand_stack.push(Object::Boolean(ord.is_ge()));
    Ok(())
}

pub fn lt(ctx: &mut Context) -> Result<(), PSError> {
    let ord = compare(ctx, "lt")?;
    ctx.operand_stack.push(Object::Boolean(ord.is_lt()));
    Ok(())
}

pub fn le(ctx: &mut Context) -> Result<(), PSError> {
    let ord = compare(ctx, "le")?;
    ctx.operand_stack.push(Object::Boolean(ord.is_le()));
    Ok(())
}

/// `and`/`or`/`xor`: boolean on two Booleans, bitwise on two Integers (§4.1
/// glossary "and").
fn logic(ctx: &mut Context, cmd: &str, bf: impl Fn(bool, bool) -> bool, intf: impl Fn(i64, i64) -> i64) -> Result<(), PSError> {
    let b = pop(ctx, cmd)?;
    let a = pop(ctx, cmd)?;
    match (&a, &b) {
        (Object::Boolean(x), Object::Boolean(y)) => {
            ctx.operand_stack.push(Object::Boolean(bf(*x, *y)));
            Ok(())
        }
        (Object::Integer(x), Object::Integer(y)) => {
            ctx.operand_stack.push(Object::Integer(intf(*x, *y)));
            Ok(())
        }
        _ => Err(err(ErrorKind::TypeCheck, cmd, "expected two booleans or two integers")),
    }
}

pub fn and(ctx: &mut Context) -> Result<(), PSError> {
    logic(ctx, "and", |a, b| a && b, |a, b| a & b)
}

pub fn or(ctx: &mut Context) -> Result<(), PSError> {
    logic(ctx, "or", |a, b| a || b, |a, b| a | b)
}

pub fn xor(ctx: &mut Context) -> Result<(), PSError> {
    logic(ctx, "xor", |a, b| a != b, |a, b| a ^ b)
}

pub fn not(ctx: &mut Context) -> Result<(), PSError> {
    let a = pop(ctx, "not")?;
    match a {
        Object::Boolean(x) => {
            ctx.operand_stack.push(Object::Boolean(!x));
            Ok(())
        }
        Object::Integer(x) => {
            ctx.operand_stack.push(Object::Integer(!x));
            Ok(())
        }
        _ => Err(err(ErrorKind::TypeCheck, "not", "expected a boolean or an integer")),
    }
}

/// `int shift bitshift result`: positive shift is left, negative is right
/// (§4.1 glossary "bitshift").
pub fn bitshift(ctx: &mut Context) -> Result<(), PSError> {
    let shift = pop(ctx, "bitshift")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "bitshift", "expected integers"))?;
    let value = pop(ctx, "bitshift")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "bitshift", "expected integers"))?;
    let result = if shift >= 0 {
        if shift >= 64 {
            0
        } else {
            ((value as i128) << shift) as i64
        }
    } else {
        let s = (-shift).min(63);
        ((value as u64) >> s) as i64
    };
    ctx.operand_stack.push(Object::Integer(result));
    Ok(())
}

pub fn push_true(ctx: &mut Context) -> Result<(), PSError> {
    ctx.operand_stack.push(Object::Boolean(true));
    Ok(())
}

pub fn push_false(ctx: &mut Context) -> Result<(), PSError> {
    ctx.operand_stack.push(Object::Boolean(false));
    Ok(())
}
