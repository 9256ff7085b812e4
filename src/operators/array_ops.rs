//! Array construction and the generic accessors shared with strings and
//! dicts (§4.1 "Generic operators" in the PostScript model: `length`/`get`/
//! `put`/`copy`/`forall` each dispatch on the operand's concrete type rather
//! than being array-only).

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::{LoopHeader, LoopKind, Object, PArray};
use crate::stacks::{check_push, MAX_OPERAND_STACK};
use crate::vm::{check_store_access, cow_check_array, register_new};

use super::def;
use super::stack_ops::pop_to_mark;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "array", array);
    def(dict, "[", mark_start);
    def(dict, "]", array_end);
    def(dict, "length", length);
    def(dict, "get", get);
    def(dict, "put", put);
    def(dict, "getinterval", getinterval);
    def(dict, "putinterval", putinterval);
    def(dict, "aload", aload);
    def(dict, "astore", astore);
    def(dict, "forall", forall);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

/// `int array array` (§4.1): allocates an array of `int` nulls in the
/// currently selected VM.
pub fn array(ctx: &mut Context) -> Result<(), PSError> {
    let n = pop(ctx, "array")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "array", "expected an integer"))?;
    if n < 0 {
        return Err(err(ErrorKind::RangeCheck, "array", "negative length"));
    }
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    let arr = PArray::new(vec![Object::Null; n as usize], is_global);
    register_new(ctx, arr.header.timestamp, is_global);
    ctx.operand_stack.push(Object::Array(arr));
    Ok(())
}

pub fn mark_start(ctx: &mut Context) -> Result<(), PSError> {
    check_push(ctx.operand_stack.len(), MAX_OPERAND_STACK, "[", ErrorKind::StackOverflow)?;
    ctx.operand_stack.push(Object::Mark);
    Ok(())
}

pub fn array_end(ctx: &mut Context) -> Result<(), PSError> {
    let items = pop_to_mark(ctx, "]")?;
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    let arr = PArray::new(items, is_global);
    register_new(ctx, arr.header.timestamp, is_global);
    ctx.operand_stack.push(Object::Array(arr));
    Ok(())
}

pub fn length(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "length")?;
    let n = match &v {
        Object::Array(a) | Object::PackedArray(a) => a.length as i64,
        Object::String(s) => s.length as i64,
        Object::Dict(d) => d.map.borrow().len() as i64,
        Object::Name(n, _) => n.len() as i64,
        _ => return Err(err(ErrorKind::TypeCheck, "length", "unsupported operand type")),
    };
    ctx.operand_stack.push(Object::Integer(n));
    Ok(())
}

pub fn get(ctx: &mut Context) -> Result<(), PSError> {
    let index = pop(ctx, "get")?;
    let container = pop(ctx, "get")?;
    match container {
        Object::Array(a) | Object::PackedArray(a) => {
            let i = index.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "get", "expected an integer index"))?;
            let item = bounds_get(&a.to_vec(), i, "get")?;
            ctx.operand_stack.push(item);
        }
        Object::String(s) => {
            let i = index.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "get", "expected an integer index"))?;
            let bytes = s.as_bytes();
            let item = bounds_get(&bytes, i, "get")?;
            ctx.operand_stack.push(Object::Integer(item as i64));
        }
        Object::Dict(d) => {
            let Object::Name(key, _) = &index else { return Err(err(ErrorKind::TypeCheck, "get", "expected a name key")) };
            let v = d.get(key).ok_or_else(|| err(ErrorKind::Undefined, "get", format!("/{} not in dict", key)))?;
            ctx.operand_stack.push(v);
        }
        _ => return Err(err(ErrorKind::TypeCheck, "get", "unsupported operand type")),
    }
    Ok(())
}

fn bounds_get<T: Clone>(items: &[T], i: i64, cmd: &str) -> Result<T, PSError> {
    if i < 0 || i as usize >= items.len() {
        return Err(err(ErrorKind::RangeCheck, cmd, "index out of range"));
    }
    Ok(items[i as usize].clone())
}

pub fn put(ctx: &mut Context) -> Result<(), PSError> {
    let value = pop(ctx, "put")?;
    let index = pop(ctx, "put")?;
    let container = pop(ctx, "put")?;
    match container {
        Object::Array(a) => {
            let i = index.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "put", "expected an integer index"))?;
            if i < 0 || i as usize >= a.length {
                return Err(err(ErrorKind::RangeCheck, "put", "index out of range"));
            }
            check_store_access(a.header.is_global, &value)?;
            cow_check_array(ctx, &a);
            a.backing.borrow_mut()[a.start + i as usize] = value;
        }
        Object::String(s) => {
            let i = index.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "put", "expected an integer index"))?;
            if i < 0 || i as usize >= s.length {
                return Err(err(ErrorKind::RangeCheck, "put", "index out of range"));
            }
            let byte = value.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "put", "expected an integer byte value"))?;
            crate::vm::cow_check_string(ctx, &s);
            s.buffer.borrow_mut()[s.start + i as usize] = byte as u8;
        }
        Object::Dict(d) => {
            let Object::Name(key, _) = &index else { return Err(err(ErrorKind::TypeCheck, "put", "expected a name key")) };
            if !d.map.borrow().contains_key(key.as_ref()) && d.map.borrow().len() >= d.max_length {
                return Err(err(ErrorKind::DictFull, "put", "dictionary is full"));
            }
            check_store_access(d.header.is_global, &value)?;
            crate::vm::cow_check_dict(ctx, &d);
            d.map.borrow_mut().insert(key.to_string(), value);
        }
        Object::PackedArray(_) => return Err(err(ErrorKind::InvalidAccess, "put", "packed arrays are read-only")),
        _ => return Err(err(ErrorKind::TypeCheck, "put", "unsupported operand type")),
    }
    Ok(())
}

pub fn getinterval(ctx: &mut Context) -> Result<(), PSError> {
    let count = pop(ctx, "getinterval")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "getinterval", "expected an integer count"))?;
    let start = pop(ctx, "getinterval")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "getinterval", "expected an integer start"))?;
    let container = pop(ctx, "getinterval")?;
    if count < 0 || start < 0 {
        return Err(err(ErrorKind::RangeCheck, "getinterval", "negative start or count"));
    }
    let (start, count) = (start as usize, count as usize);
    match container {
        Object::Array(a) | Object::PackedArray(a) => {
            if start + count > a.length {
                return Err(err(ErrorKind::RangeCheck, "getinterval", "interval out of bounds"));
            }
            ctx.operand_stack.push(Object::Array(a.slice(start, count)));
        }
        Object::String(s) => {
            if start + count > s.length {
                return Err(err(ErrorKind::RangeCheck, "getinterval", "interval out of bounds"));
            }
            ctx.operand_stack.push(Object::String(s.slice(start, count)));
        }
        _ => return Err(err(ErrorKind::TypeCheck, "getinterval", "unsupported operand type")),
    }
    Ok(())
}

pub fn putinterval(ctx: &mut Context) -> Result<(), PSError> {
    let src = pop(ctx, "putinterval")?;
    let start = pop(ctx, "putinterval")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "putinterval", "expected an integer start"))?;
    let dest = pop(ctx, "putinterval")?;
    if start < 0 {
        return Err(err(ErrorKind::RangeCheck, "putinterval", "negative start"));
    }
    let start = start as usize;
    match (dest, src) {
        (Object::Array(d), Object::Array(s)) | (Object::Array(d), Object::PackedArray(s)) => {
            if start + s.length > d.length {
                return Err(err(ErrorKind::RangeCheck, "putinterval", "interval out of bounds"));
            }
            cow_check_array(ctx, &d);
            let values = s.to_vec();
            let mut backing = d.backing.borrow_mut();
            for (i, v) in values.into_iter().enumerate() {
                backing[d.start + start + i] = v;
            }
        }
        (Object::String(d), Object::String(s)) => {
            if start + s.length > d.length {
                return Err(err(ErrorKind::RangeCheck, "putinterval", "interval out of bounds"));
            }
            crate::vm::cow_check_string(ctx, &d);
            let bytes = s.as_bytes();
            let mut backing = d.buffer.borrow_mut();
            for (i, b) in bytes.into_iter().enumerate() {
                backing[d.start + start + i] = b;
            }
        }
        _ => return Err(err(ErrorKind::TypeCheck, "putinterval", "mismatched or unsupported operand types")),
    }
    Ok(())
}

/// `array aload ... array` (§4.1): pushes every element followed by the
/// array itself.
pub fn aload(ctx: &mut Context) -> Result<(), PSError> {
    let top = pop(ctx, "aload")?;
    let Object::Array(a) = &top else { return Err(err(ErrorKind::TypeCheck, "aload", "expected an array")) };
    for v in a.to_vec() {
        ctx.operand_stack.push(v);
    }
    ctx.operand_stack.push(top);
    Ok(())
}

/// `any1 ... anyn array astore subarray` (§4.1): fills `array` from the
/// operand stack, consuming exactly `array`'s length worth of operands.
pub fn astore(ctx: &mut Context) -> Result<(), PSError> {
    let top = pop(ctx, "astore")?;
    let Object::Array(a) = top else { return Err(err(ErrorKind::TypeCheck, "astore", "expected an array")) };
    if a.length > ctx.operand_stack.len() {
        return Err(err(ErrorKind::StackUnderflow, "astore", "not enough operands to fill array"));
    }
    let start = ctx.operand_stack.len() - a.length;
    let values: Vec<Object> = ctx.operand_stack.split_off(start);
    cow_check_array(ctx, &a);
    {
        let mut backing = a.backing.borrow_mut();
        for (i, v) in values.into_iter().enumerate() {
            backing[a.start + i] = v;
        }
    }
    ctx.operand_stack.push(Object::Array(a));
    Ok(())
}

/// `array proc forall -` (§4.2 "forall"): one element pushed per pass,
/// driven through the standard loop-header mechanism so the procedure body
/// runs through the ordinary dispatch loop rather than a Rust-level loop.
pub fn forall(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop(ctx, "forall")?;
    let container = pop(ctx, "forall")?;
    match container {
        Object::Array(a) | Object::PackedArray(a) => {
            let items = std::rc::Rc::new(a.to_vec());
            ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader {
                kind: LoopKind::ForAll { items, cursor: 0, per_call: 1 },
                proc,
                saved_font: ctx.current_font,
            })));
        }
        Object::String(s) => {
            let items: Vec<Object> = s.as_bytes().into_iter().map(|b| Object::Integer(b as i64)).collect();
            ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader {
                kind: LoopKind::ForAll { items: std::rc::Rc::new(items), cursor: 0, per_call: 1 },
                proc,
                saved_font: ctx.current_font,
            })));
        }
        Object::Dict(d) => {
            let mut items = Vec::new();
            for (k, v) in d.map.borrow().iter() {
                items.push(Object::literal_name(k));
                items.push(v.clone());
            }
            ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader {
                kind: LoopKind::ForAll { items: std::rc::Rc::new(items), cursor: 0, per_call: 2 },
                proc,
                saved_font: ctx.current_font,
            })));
        }
        _ => return Err(err(ErrorKind::TypeCheck, "forall", "unsupported operand type")),
    }
    Ok(())
}
