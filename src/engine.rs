//! The dispatch loop (§4.1) and loop-header advancement (§4.2).
//!
//! Grounded on `interpreter.rs`'s execution-stack-pop loop: "push the next
//! iteration's state back onto the execution stack before the procedure
//! body" is exactly how that module drives `ForLoop`/`RepeatLoop`, carried
//! over here for the full set of seven loop kinds. Procedures never recurse
//! through the Rust call stack — running one just unrolls its elements onto
//! `execution_stack` via [`invoke`] — so arbitrarily long `repeat`/`loop`
//! bodies run in bounded native stack depth (§8 "tail-call depth
//! boundedness"). A procedure merely *encountered* on the execution stack —
//! read fresh off a file, or sitting as a nested element of an enclosing
//! procedure — is different: it self-quotes onto the operand stack as data
//! (see `dispatch()`'s doc comment), exactly as the teacher's
//! `interpreter.rs::execute_one` and the original's `exec_exec` both treat a
//! directly-encountered executable array.

use crate::context::Context;
use crate::error::{err, install_error, ErrorKind, PSError};
use crate::object::{Attr, LoopHeader, LoopKind, Object};
use crate::tokenizer;

/// Runs the dispatch loop to exhaustion, folding operator errors into
/// execution via [`install_error`] instead of propagating them to the
/// caller (§7 "Propagation policy"). Returns only once the execution stack
/// is empty or `quit`/`stop`-at-top-level has requested early exit.
pub fn run(ctx: &mut Context) {
    while !ctx.quit_requested {
        let Some(obj) = ctx.execution_stack.pop() else { break };
        if matches!(obj, Object::HardReturn) {
            continue; // orphaned sentinel at top level: nothing to terminate
        }
        tick(ctx);
        if let Err(e) = dispatch(ctx, obj) {
            install_error(ctx, &e);
        }
    }
}

/// Runs the dispatch loop until it consumes a matching `HardReturn`
/// sentinel, used to re-enter the loop for a Type 3 `BuildChar`/`BuildGlyph`
/// procedure without recursing through `run` itself (§4.6).
pub fn run_until_hard_return(ctx: &mut Context) -> Result<(), PSError> {
    loop {
        let Some(obj) = ctx.execution_stack.pop() else {
            return Err(err(ErrorKind::ExecStackOverflow, "show", "CharProc never returned"));
        };
        if matches!(obj, Object::HardReturn) {
            return Ok(());
        }
        tick(ctx);
        if let Err(e) = dispatch(ctx, obj) {
            install_error(ctx, &e);
        }
    }
}

/// Runs the dispatch loop until it consumes the `Stopped` sentinel `stopped`
/// pushed beneath its procedure, returning whether `stop` was invoked in
/// between (§4.2 "stop"/"stopped"). `stop` itself just truncates the
/// execution stack back down to that sentinel and sets
/// `ctx.stop_requested`; this loop is the only consumer that clears the flag.
pub fn run_until_stopped(ctx: &mut Context) -> bool {
    loop {
        let Some(obj) = ctx.execution_stack.pop() else { return false };
        if matches!(obj, Object::Stopped) {
            let flag = ctx.stop_requested;
            ctx.stop_requested = false;
            return flag;
        }
        tick(ctx);
        if let Err(e) = dispatch(ctx, obj) {
            install_error(ctx, &e);
        }
    }
}

fn tick(ctx: &mut Context) {
    ctx.iteration_count += 1;
    if ctx.iteration_count % 10_000 == 0 {
        if let Some(mut cb) = ctx.event_loop_callback.take() {
            cb(ctx);
            ctx.event_loop_callback = Some(cb);
        }
    }
}

/// One step of the dispatch loop (§4.1 "rules"):
/// 1. Literal value types always push to the operand stack.
/// 2. An executable Name is looked up and its value re-dispatched.
/// 3. An executable Array (procedure) encountered directly — not substituted
///    in by a name lookup — self-quotes onto the operand stack as data; it
///    only actually runs through [`invoke`], which every explicit invocation
///    path (`exec`, `if`/`ifelse`, loop-header advance) goes through instead
///    of pushing the procedure straight onto the execution stack. Matches
///    the teacher's `interpreter.rs::execute_one` ("a `Block` encountered
///    directly is pushed to the operand stack, never unrolled") and the
///    original's `exec_exec`, where an array-typed, executable element
///    turned up while unrolling is pushed to `o_stack`, not re-executed.
/// 4. An Operator is called directly.
/// 5. A File yields its next scanned token, then re-pushes itself.
/// 6. A Loop header advances per its `LoopKind`.
fn dispatch(ctx: &mut Context, obj: Object) -> Result<(), PSError> {
    match obj {
        Object::Name(name, Attr::Executable) => dispatch_name(ctx, &name),
        Object::Array(a) if a.attr == Attr::Executable => {
            ctx.operand_stack.push(Object::Array(a));
            Ok(())
        }
        Object::Operator(op) => {
            ctx.note_dispatch(op.name);
            (op.func)(ctx)
        }
        Object::File(f) => {
            let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
            match tokenizer::next_object(&f, is_global)? {
                Some(tok) => {
                    tokenizer::register_scanned(ctx, &tok);
                    ctx.execution_stack.push(Object::File(f));
                    ctx.execution_stack.push(tok);
                }
                None => {} // EOF: stream simply drops off the execution stack
            }
            Ok(())
        }
        Object::Loop(header) => advance_loop(ctx, *header),
        literal => {
            ctx.operand_stack.push(literal);
            Ok(())
        }
    }
}

fn dispatch_name(ctx: &mut Context, name: &str) -> Result<(), PSError> {
    let Some(value) = lookup(ctx, name) else {
        return Err(err(ErrorKind::Undefined, name, format!("/{} is not defined in any dictionary on the dict stack", name)));
    };
    match value {
        Object::Operator(op) => {
            ctx.note_dispatch(op.name);
            (op.func)(ctx)
        }
        Object::Array(a) if a.attr == Attr::Executable => {
            ctx.note_dispatch(name);
            unroll(ctx, a);
            Ok(())
        }
        other => {
            ctx.operand_stack.push(other);
            Ok(())
        }
    }
}

fn unroll(ctx: &mut Context, a: crate::object::PArray) {
    for item in a.to_vec().into_iter().rev() {
        ctx.execution_stack.push(item);
    }
}

/// Explicit invocation (§4.1 "exec"): unrolls a procedure array's elements
/// directly onto the execution stack rather than pushing the procedure
/// itself, so the next dispatch-loop pass runs its body instead of having
/// `dispatch()`'s own self-quoting rule treat it as data. Every call site
/// that means "run this now" — `exec`, `if`/`ifelse`, `stopped`, and
/// loop-header advance (`run_proc` below) — goes through this instead of a
/// bare `execution_stack.push`.
pub fn invoke(ctx: &mut Context, proc: Object) {
    match proc {
        Object::Array(a) if a.attr == Attr::Executable => unroll(ctx, a),
        other => ctx.execution_stack.push(other),
    }
}

/// Dictionary-stack lookup (§3.2 "Name resolution"): nearest enclosing
/// dictionary wins, i.e. search from the top of `dict_stack` down.
pub fn lookup(ctx: &Context, name: &str) -> Option<Object> {
    ctx.dict_stack.iter().rev().find_map(|d| d.get(name))
}

/// Advances one loop header by one pass (§4.2). Pushes the updated header
/// back onto the execution stack before the procedure body so the next
/// dispatch-loop iteration resumes the loop automatically once the body
/// finishes running — the same pattern `interpreter.rs` uses for its
/// `ForLoop`/`RepeatLoop` variants, generalized to all seven kinds here.
fn advance_loop(ctx: &mut Context, header: LoopHeader) -> Result<(), PSError> {
    match header.kind {
        LoopKind::For { current, step, limit } => {
            let continues = if step >= 0.0 { current <= limit } else { current >= limit };
            if !continues {
                return Ok(());
            }
            requeue(ctx, LoopKind::For { current: current + step, step, limit }, header.proc.clone(), header.saved_font);
            push_num(ctx, current);
            run_proc(ctx, header.proc);
        }
        LoopKind::Repeat { remaining } => {
            if remaining <= 0 {
                return Ok(());
            }
            requeue(ctx, LoopKind::Repeat { remaining: remaining - 1 }, header.proc.clone(), header.saved_font);
            run_proc(ctx, header.proc);
        }
        LoopKind::Loop => {
            requeue(ctx, LoopKind::Loop, header.proc.clone(), header.saved_font);
            run_proc(ctx, header.proc);
        }
        LoopKind::ForAll { ref items, cursor, per_call } => {
            if cursor + per_call > items.len() {
                return Ok(());
            }
            let items_clone = items.clone();
            requeue(ctx, LoopKind::ForAll { items: items_clone.clone(), cursor: cursor + per_call, per_call }, header.proc.clone(), header.saved_font);
            for v in &items_clone[cursor..cursor + per_call] {
                ctx.operand_stack.push(v.clone());
            }
            run_proc(ctx, header.proc);
        }
        LoopKind::CShow { ref string, cursor } => {
            let bytes = string.as_bytes();
            if cursor >= bytes.len() {
                return Ok(());
            }
            if let Some(font) = header.saved_font {
                ctx.current_font = Some(font);
            }
            requeue(ctx, LoopKind::CShow { string: string.clone(), cursor: cursor + 1 }, header.proc.clone(), header.saved_font);
            ctx.operand_stack.push(Object::Integer(bytes[cursor] as i64));
            run_proc(ctx, header.proc);
        }
        LoopKind::KShow { ref string, cursor } => {
            let bytes = string.as_bytes();
            if cursor + 1 >= bytes.len() {
                return Ok(());
            }
            if let Some(font) = header.saved_font {
                ctx.current_font = Some(font);
            }
            requeue(ctx, LoopKind::KShow { string: string.clone(), cursor: cursor + 1 }, header.proc.clone(), header.saved_font);
            ctx.operand_stack.push(Object::Integer(bytes[cursor] as i64));
            ctx.operand_stack.push(Object::Integer(bytes[cursor + 1] as i64));
            run_proc(ctx, header.proc);
        }
        LoopKind::PathForAll { ref elements, cursor } => {
            if cursor >= elements.len() {
                return Ok(());
            }
            let elements_clone = elements.clone();
            requeue(ctx, LoopKind::PathForAll { elements: elements_clone.clone(), cursor: cursor + 1 }, header.proc.clone(), header.saved_font);
            push_element_args(ctx, &elements_clone[cursor]);
            run_proc(ctx, select_path_proc(&header.proc, &elements_clone[cursor]));
        }
        LoopKind::FilenameForAll { ref names, cursor } => {
            if cursor >= names.len() {
                return Ok(());
            }
            let names_clone = names.clone();
            requeue(ctx, LoopKind::FilenameForAll { names: names_clone.clone(), cursor: cursor + 1 }, header.proc.clone(), header.saved_font);
            ctx.operand_stack.push(Object::string(&names_clone[cursor]));
            run_proc(ctx, header.proc);
        }
    }
    Ok(())
}

fn requeue(ctx: &mut Context, kind: LoopKind, proc: Object, saved_font: Option<crate::fonts::FontId>) {
    ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader { kind, proc, saved_font })));
}

fn push_num(ctx: &mut Context, v: f64) {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        ctx.operand_stack.push(Object::Integer(v as i64));
    } else {
        ctx.operand_stack.push(Object::Real(v));
    }
}

fn run_proc(ctx: &mut Context, proc: Object) {
    invoke(ctx, proc);
}

/// `pathforall`'s four-procedure dispatch: `proc` holds a literal array of
/// `[moveproc lineproc curveproc closeproc]`; selects the one matching this
/// path element (§4.6, glossary "pathforall").
fn select_path_proc(proc: &Object, el: &crate::path::PathElement) -> Object {
    let Object::Array(a) = proc else { return proc.clone() };
    let procs = a.to_vec();
    let idx = match el {
        crate::path::PathElement::MoveTo(_, _) => 0,
        crate::path::PathElement::LineTo(_, _) => 1,
        crate::path::PathElement::CurveTo(..) => 2,
        crate::path::PathElement::ClosePath => 3,
    };
    procs.get(idx).cloned().unwrap_or(Object::Null)
}

fn push_element_args(ctx: &mut Context, el: &crate::path::PathElement) {
    match *el {
        crate::path::PathElement::MoveTo(x, y) | crate::path::PathElement::LineTo(x, y) => {
            push_num(ctx, x);
            push_num(ctx, y);
        }
        crate::path::PathElement::CurveTo(x1, y1, x2, y2, x3, y3) => {
            for v in [x1, y1, x2, y2, x3, y3] {
                push_num(ctx, v);
            }
        }
        crate::path::PathElement::ClosePath => {}
    }
}

/// Removes the nearest loop header from the execution stack, used by the
/// `exit` operator (§4.2 "exit").
pub fn exit_innermost_loop(ctx: &mut Context) -> bool {
    if let Some(pos) = ctx.execution_stack.iter().rposition(|o| matches!(o, Object::Loop(_))) {
        ctx.execution_stack.remove(pos);
        true
    } else {
        false
    }
}
