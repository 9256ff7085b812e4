//! Dictionary construction and the dictionary-stack operators (§4.1, §3.2).

use std::collections::HashMap;

use crate::context::Context;
use crate::engine;
use crate::error::{err, ErrorKind, PSError};
use crate::object::{Object, PDict};
use crate::stacks::{check_pop, check_push, MAX_DICT_STACK};
use crate::vm::{check_store_access, cow_check_dict, register_new};

use super::def;
use super::stack_ops::pop_to_mark;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "dict", dict_alloc);
    def(dict, "<<", mark_start);
    def(dict, ">>", dict_end);
    def(dict, "begin", begin);
    def(dict, "end", end);
    def(dict, "def", def_op);
    def(dict, "load", load);
    def(dict, "store", store);
    def(dict, "known", known);
    def(dict, "undef", undef);
    def(dict, "maxlength", maxlength);
    def(dict, "currentdict", currentdict);
    def(dict, "dictstack", dictstack);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

pub fn dict_alloc(ctx: &mut Context) -> Result<(), PSError> {
    let n = pop(ctx, "dict")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "dict", "expected an integer"))?;
    if n < 0 {
        return Err(err(ErrorKind::RangeCheck, "dict", "negative capacity"));
    }
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    let d = PDict::new(n as usize, is_global);
    register_new(ctx, d.header.timestamp, is_global);
    ctx.operand_stack.push(Object::Dict(d));
    Ok(())
}

pub fn mark_start(ctx: &mut Context) -> Result<(), PSError> {
    check_push(ctx.operand_stack.len(), crate::stacks::MAX_OPERAND_STACK, "<<", ErrorKind::StackOverflow)?;
    ctx.operand_stack.push(Object::Mark);
    Ok(())
}

/// `mark key1 val1 ... keyn valn >> dict` (§4.1 "<<" / ">>"): builds a
/// dictionary sized to exactly its key/value pair count.
pub fn dict_end(ctx: &mut Context) -> Result<(), PSError> {
    let items = pop_to_mark(ctx, ">>")?;
    if items.len() % 2 != 0 {
        return Err(err(ErrorKind::RangeCheck, ">>", "odd number of key/value entries"));
    }
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    let d = PDict::new(items.len() / 2, is_global);
    {
        let mut map = d.map.borrow_mut();
        for pair in items.chunks_exact(2) {
            let Object::Name(key, _) = &pair[0] else { return Err(err(ErrorKind::TypeCheck, ">>", "expected a name key")) };
            map.insert(key.to_string(), pair[1].clone());
        }
    }
    register_new(ctx, d.header.timestamp, is_global);
    ctx.operand_stack.push(Object::Dict(d));
    Ok(())
}

pub fn begin(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "begin")?;
    let Object::Dict(d) = v else { return Err(err(ErrorKind::TypeCheck, "begin", "expected a dict")) };
    check_push(ctx.dict_stack.len(), MAX_DICT_STACK, "begin", ErrorKind::DictStackOverflow)?;
    ctx.dict_stack.push(d);
    Ok(())
}

pub fn end(ctx: &mut Context) -> Result<(), PSError> {
    check_pop(ctx.dict_stack.len() <= 2, "end", ErrorKind::DictStackUnderflow)?;
    ctx.dict_stack.pop();
    Ok(())
}

pub fn def_op(ctx: &mut Context) -> Result<(), PSError> {
    let value = pop(ctx, "def")?;
    let key = pop(ctx, "def")?;
    let Object::Name(key, _) = key else { return Err(err(ErrorKind::TypeCheck, "def", "expected a name key")) };
    let d = ctx.dict_stack.last().expect("dict stack is never empty").clone();
    if !d.map.borrow().contains_key(key.as_ref()) && d.map.borrow().len() >= d.max_length {
        return Err(err(ErrorKind::DictFull, "def", "dictionary is full"));
    }
    check_store_access(d.header.is_global, &value)?;
    cow_check_dict(ctx, &d);
    d.map.borrow_mut().insert(key.to_string(), value);
    Ok(())
}

pub fn load(ctx: &mut Context) -> Result<(), PSError> {
    let key = pop(ctx, "load")?;
    let Object::Name(key, _) = key else { return Err(err(ErrorKind::TypeCheck, "load", "expected a name key")) };
    let value = engine::lookup(ctx, &key).ok_or_else(|| err(ErrorKind::Undefined, "load", format!("/{} is not defined", key)))?;
    ctx.operand_stack.push(value);
    Ok(())
}

/// `key value store` (§4.1 "store"): like `def`, but if `key` is already
/// bound in an enclosing dictionary that binding is updated in place instead
/// of shadowing it in the current dictionary.
pub fn store(ctx: &mut Context) -> Result<(), PSError> {
    let value = pop(ctx, "store")?;
    let key = pop(ctx, "store")?;
    let Object::Name(key, _) = key else { return Err(err(ErrorKind::TypeCheck, "store", "expected a name key")) };
    let existing = ctx.dict_stack.iter().rev().find(|d| d.map.borrow().contains_key(key.as_ref())).cloned();
    let d = existing.unwrap_or_else(|| ctx.dict_stack.last().expect("dict stack is never empty").clone());
    check_store_access(d.header.is_global, &value)?;
    cow_check_dict(ctx, &d);
    d.map.borrow_mut().insert(key.to_string(), value);
    Ok(())
}

pub fn known(ctx: &mut Context) -> Result<(), PSError> {
    let key = pop(ctx, "known")?;
    let d = pop(ctx, "known")?;
    let Object::Dict(d) = d else { return Err(err(ErrorKind::TypeCheck, "known", "expected a dict")) };
    let Object::Name(key, _) = key else { return Err(err(ErrorKind::TypeCheck, "known", "expected a name key")) };
    ctx.operand_stack.push(Object::Boolean(d.map.borrow().contains_key(key.as_ref())));
    Ok(())
}

pub fn undef(ctx: &mut Context) -> Result<(), PSError> {
    let key = pop(ctx, "undef")?;
    let d = pop(ctx, "undef")?;
    let Object::Dict(d) = d else { return Err(err(ErrorKind::TypeCheck, "undef", "expected a dict")) };
    let Object::Name(key, _) = key else { return Err(err(ErrorKind::TypeCheck, "undef", "expected a name key")) };
    cow_check_dict(ctx, &d);
    d.map.borrow_mut().remove(key.as_ref());
    Ok(())
}

pub fn maxlength(ctx: &mut Context) -> Result<(), PSError> {
    let d = pop(ctx, "maxlength")?;
    let Object::Dict(d) = d else { return Err(err(ErrorKind::TypeCheck, "maxlength", "expected a dict")) };
    ctx.operand_stack.push(Object::Integer(d.max_length as i64));
    Ok(())
}

pub fn currentdict(ctx: &mut Context) -> Result<(), PSError> {
    let d = ctx.dict_stack.last().expect("dict stack is never empty").clone();
    ctx.operand_stack.push(Object::Dict(d));
    Ok(())
}

/// `array dictstack subarray` (§4.1): fills `array` (bottom-to-top) with the
/// current dictionary stack, returning the filled prefix.
pub fn dictstack(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "dictstack")?;
    let Object::Array(a) = v else { return Err(err(ErrorKind::TypeCheck, "dictstack", "expected an array")) };
    if ctx.dict_stack.len() > a.length {
        return Err(err(ErrorKind::RangeCheck, "dictstack", "destination array too short"));
    }
    crate::vm::cow_check_array(ctx, &a);
    {
        let mut backing = a.backing.borrow_mut();
        for (i, d) in ctx.dict_stack.iter().enumerate() {
            backing[a.start + i] = Object::Dict(d.clone());
        }
    }
    ctx.operand_stack.push(Object::Array(a.slice(0, ctx.dict_stack.len())));
    Ok(())
}
