//! Save/restore and VM allocation mode (§3.5, §5).
//!
//! `save`/`restore` themselves are thin wrappers over `vm::save`/`vm::restore`
//! — the copy-on-write bookkeeping lives there, not here.

use std::collections::HashMap;

use crate::context::{Context, VmMode};
use crate::error::{err, ErrorKind, PSError};
use crate::object::Object;
use crate::vm;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "save", save);
    def(dict, "restore", restore);
    def(dict, "setglobal", setglobal);
    def(dict, "currentglobal", currentglobal);
}

/// `- save handle` (§3.5): snapshots VM and graphics-state-stack depth.
pub fn save(ctx: &mut Context) -> Result<(), PSError> {
    let handle = vm::save(ctx);
    ctx.operand_stack.push(Object::Save(handle));
    Ok(())
}

/// `handle restore -` (§3.5, §4.3): rolls composites and the graphics-state
/// stack back to their state at the matching `save`.
pub fn restore(ctx: &mut Context) -> Result<(), PSError> {
    let Object::Save(handle) = ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, "restore", "empty operand stack"))? else {
        return Err(err(ErrorKind::TypeCheck, "restore", "expected a save object"));
    };
    vm::restore(ctx, handle)
}

/// `bool setglobal -` (§5): selects which reference map subsequent
/// composite allocations register into.
pub fn setglobal(ctx: &mut Context) -> Result<(), PSError> {
    let Object::Boolean(b) = ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, "setglobal", "empty operand stack"))? else {
        return Err(err(ErrorKind::TypeCheck, "setglobal", "expected a boolean"));
    };
    ctx.vm_alloc_mode = if b { VmMode::Global } else { VmMode::Local };
    Ok(())
}

/// `- currentglobal bool` (§5).
pub fn currentglobal(ctx: &mut Context) -> Result<(), PSError> {
    ctx.operand_stack.push(Object::Boolean(ctx.vm_alloc_mode == VmMode::Global));
    Ok(())
}
