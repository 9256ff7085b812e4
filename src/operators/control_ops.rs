//! Conditional and loop-construction operators (§4.2).
//!
//! `for`/`repeat`/`loop`/`forall`-family bodies never recurse through the
//! Rust call stack — constructing the loop header here just pushes one
//! `Object::Loop` value onto the execution stack; `engine::advance_loop`
//! drives it one pass at a time (§8 "tail-call depth boundedness").

use std::collections::HashMap;

use crate::context::Context;
use crate::engine;
use crate::error::{self, err, ErrorKind, PSError};
use crate::object::{Attr, LoopHeader, LoopKind, Object};

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "if", if_op);
    def(dict, "ifelse", ifelse);
    def(dict, "for", for_op);
    def(dict, "repeat", repeat);
    def(dict, "loop", loop_op);
    def(dict, "exit", exit);
    def(dict, "exec", exec);
    def(dict, "stop", stop);
    def(dict, "stopped", stopped);
    def(dict, "quit", quit);
    def(dict, "handleerror", error::handleerror);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_proc(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    let v = pop(ctx, cmd)?;
    match &v {
        Object::Array(a) if a.attr == Attr::Executable => Ok(v),
        _ => Err(err(ErrorKind::TypeCheck, cmd, "expected a procedure")),
    }
}

fn pop_bool(ctx: &mut Context, cmd: &str) -> Result<bool, PSError> {
    match pop(ctx, cmd)? {
        Object::Boolean(b) => Ok(b),
        _ => Err(err(ErrorKind::TypeCheck, cmd, "expected a boolean")),
    }
}

pub fn if_op(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop_proc(ctx, "if")?;
    let cond = pop_bool(ctx, "if")?;
    if cond {
        engine::invoke(ctx, proc);
    }
    Ok(())
}

pub fn ifelse(ctx: &mut Context) -> Result<(), PSError> {
    let proc2 = pop_proc(ctx, "ifelse")?;
    let proc1 = pop_proc(ctx, "ifelse")?;
    let cond = pop_bool(ctx, "ifelse")?;
    engine::invoke(ctx, if cond { proc1 } else { proc2 });
    Ok(())
}

pub fn for_op(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop_proc(ctx, "for")?;
    let limit = pop(ctx, "for")?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, "for", "expected a number"))?;
    let increment = pop(ctx, "for")?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, "for", "expected a number"))?;
    let initial = pop(ctx, "for")?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, "for", "expected a number"))?;
    if increment == 0.0 {
        return Err(err(ErrorKind::RangeCheck, "for", "zero increment never terminates"));
    }
    let header = LoopHeader { kind: LoopKind::For { current: initial, step: increment, limit }, proc, saved_font: ctx.current_font };
    ctx.execution_stack.push(Object::Loop(Box::new(header)));
    Ok(())
}

pub fn repeat(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop_proc(ctx, "repeat")?;
    let n = pop(ctx, "repeat")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "repeat", "expected an integer"))?;
    if n < 0 {
        return Err(err(ErrorKind::RangeCheck, "repeat", "negative count"));
    }
    let header = LoopHeader { kind: LoopKind::Repeat { remaining: n }, proc, saved_font: ctx.current_font };
    ctx.execution_stack.push(Object::Loop(Box::new(header)));
    Ok(())
}

pub fn loop_op(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop_proc(ctx, "loop")?;
    let header = LoopHeader { kind: LoopKind::Loop, proc, saved_font: ctx.current_font };
    ctx.execution_stack.push(Object::Loop(Box::new(header)));
    Ok(())
}

/// `exit` (§4.2): terminates the innermost enclosing loop header on the
/// execution stack.
pub fn exit(ctx: &mut Context) -> Result<(), PSError> {
    if engine::exit_innermost_loop(ctx) {
        Ok(())
    } else {
        Err(err(ErrorKind::InvalidExit, "exit", "no enclosing loop"))
    }
}

/// `any exec -` (§4.1 glossary "exec"): runs `any` — a procedure invoked
/// this way actually executes, unlike one merely encountered on the
/// execution stack (which self-quotes as data; see `engine::dispatch`'s doc
/// comment), since `exec` is exactly the explicit "run this" request
/// `engine::invoke` models.
pub fn exec(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "exec")?;
    engine::invoke(ctx, v);
    Ok(())
}

/// `proc stopped bool` (§4.2): runs `proc`, returning whether `stop` was
/// invoked during it. Mirrors the `HardReturn` re-entrancy protocol Type 3
/// glyph procedures use, with its own `Stopped` sentinel and
/// `engine::run_until_stopped` wait loop.
pub fn stopped(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop(ctx, "stopped")?;
    ctx.execution_stack.push(Object::Stopped);
    engine::invoke(ctx, proc);
    let was_stopped = engine::run_until_stopped(ctx);
    ctx.operand_stack.push(Object::Boolean(was_stopped));
    Ok(())
}

/// `stop` (§4.2): unwinds the execution stack back to the nearest `Stopped`
/// sentinel (discarding everything above it, leaving the sentinel itself for
/// `run_until_stopped` to consume) and flags that a stop occurred. With no
/// enclosing `stopped`, it aborts the rest of the current job the same way
/// `quit` would.
pub fn stop(ctx: &mut Context) -> Result<(), PSError> {
    if let Some(pos) = ctx.execution_stack.iter().rposition(|o| matches!(o, Object::Stopped)) {
        ctx.execution_stack.truncate(pos + 1);
        ctx.stop_requested = true;
    } else {
        ctx.execution_stack.clear();
    }
    Ok(())
}

pub fn quit(ctx: &mut Context) -> Result<(), PSError> {
    ctx.quit_requested = true;
    Ok(())
}
