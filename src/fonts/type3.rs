//! Type 3 user-defined fonts (§4.6 "Type 3 fonts").
//!
//! A Type 3 glyph has no charstring: its outline comes from running an
//! ordinary PostScript procedure (`CharProcs`) that calls `setcachedevice` or
//! `setcharwidth` and then draws with the normal path operators. That
//! procedure must run through the same dispatch loop as everything else, so
//! this module only prepares the invocation — pushing the font/selector
//! arguments and the procedure onto the stacks behind an [`Object::HardReturn`]
//! sentinel the dispatch loop uses to know when glyph-path capture ends and
//! control returns to `show` (§4.1 "HardReturn", §4.6).

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::Object;

/// The device-space metrics a `CharProc` commits via `setcachedevice` /
/// `setcharwidth` (§4.6). `cacheable` is false for `setcachedevice2`-style
/// procedures that vary per-invocation (e.g. draw a different glyph outline
/// depending on external state) and therefore must not be cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheDevice {
    pub wx: f64,
    pub wy: f64,
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
    pub cacheable: bool,
}

/// `wx wy llx lly urx ury setcachedevice` (§4.6): bounding box supplied,
/// result is cacheable.
pub fn setcachedevice(ctx: &mut Context) -> Result<(), PSError> {
    let mut args = [0.0; 6];
    for slot in args.iter_mut().rev() {
        *slot = ctx
            .operand_stack
            .pop()
            .and_then(|o| o.as_f64())
            .ok_or_else(|| err(ErrorKind::TypeCheck, "setcachedevice", "expected six numeric operands"))?;
    }
    let [wx, wy, llx, lly, urx, ury] = args;
    ctx.pending_cache_device = Some(CacheDevice { wx, wy, llx, lly, urx, ury, cacheable: true });
    Ok(())
}

/// `wx wy setcharwidth` (§4.6): width only, no bounding box — PostScript
/// draws the glyph path itself to derive bounds, which makes the result
/// non-cacheable at the path level (only the width is known up front).
pub fn setcharwidth(ctx: &mut Context) -> Result<(), PSError> {
    let wy = ctx
        .operand_stack
        .pop()
        .and_then(|o| o.as_f64())
        .ok_or_else(|| err(ErrorKind::TypeCheck, "setcharwidth", "expected two numeric operands"))?;
    let wx = ctx
        .operand_stack
        .pop()
        .and_then(|o| o.as_f64())
        .ok_or_else(|| err(ErrorKind::TypeCheck, "setcharwidth", "expected two numeric operands"))?;
    ctx.pending_cache_device = Some(CacheDevice { wx, wy, llx: 0.0, lly: 0.0, urx: 0.0, ury: 0.0, cacheable: false });
    Ok(())
}

/// Schedules a `BuildChar`/`BuildGlyph` invocation: pushes `font` and
/// `selector` (a character code Integer for `BuildChar`, a Name for
/// `BuildGlyph`) onto the operand stack, then pushes the sentinel and the
/// procedure onto the execution stack so the dispatch loop runs the
/// procedure next and recognizes completion via the `HardReturn` marker
/// underneath it.
pub fn schedule_build(ctx: &mut Context, font: Object, selector: Object, proc: Object) {
    ctx.pending_cache_device = None;
    ctx.operand_stack.push(font);
    ctx.operand_stack.push(selector);
    ctx.execution_stack.push(Object::HardReturn);
    crate::engine::invoke(ctx, proc);
}
