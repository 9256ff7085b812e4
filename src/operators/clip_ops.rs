//! Clipping-path operators (§3.3, §4.4).
//!
//! `ClipState::version` only advances when the effective clip path actually
//! changes; repeated `clip`/`rectclip` calls against an unchanged region are
//! elided rather than re-emitted onto the display list (glossary
//! "Clipping-path version").

use std::collections::HashMap;

use crate::context::Context;
use crate::display_list::{DisplayRecord, WindingRule};
use crate::error::{err, ErrorKind, PSError};
use crate::graphics_state::ClipState;
use crate::object::Object;
use crate::path::Path;
use crate::stacks::check_pop;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "clip", clip);
    def(dict, "eoclip", eoclip);
    def(dict, "initclip", initclip);
    def(dict, "clippath", clippath);
    def(dict, "rectclip", rectclip);
}

fn pop_num(ctx: &mut Context, cmd: &str) -> Result<f64, PSError> {
    ctx.operand_stack
        .pop()
        .ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))?
        .as_f64()
        .ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))
}

fn apply_clip(ctx: &mut Context, path: Path, rule: WindingRule, is_initclip: bool) {
    let unchanged = ctx.gstate().clip.path == path && ctx.gstate().clip.rule == rule;
    if unchanged {
        return;
    }
    let version = ctx.gstate().clip.version + 1;
    ctx.gstate_mut().clip = ClipState { path: path.clone(), rule, version };
    ctx.display_list.push(DisplayRecord::ClipElement { path, rule, is_initclip });
}

fn clip_impl(ctx: &mut Context, cmd: &str, rule: WindingRule) -> Result<(), PSError> {
    check_pop(ctx.gstate().path.is_empty(), cmd, ErrorKind::NoCurrentPoint)?;
    let path = ctx.gstate().path.clone();
    apply_clip(ctx, path, rule, false);
    Ok(())
}

pub fn clip(ctx: &mut Context) -> Result<(), PSError> {
    clip_impl(ctx, "clip", WindingRule::NonZero)
}

pub fn eoclip(ctx: &mut Context) -> Result<(), PSError> {
    clip_impl(ctx, "eoclip", WindingRule::EvenOdd)
}

/// `initclip` (§4.4): resets the clip to the whole imageable page.
pub fn initclip(ctx: &mut Context) -> Result<(), PSError> {
    apply_clip(ctx, Path::default(), WindingRule::NonZero, true);
    Ok(())
}

/// `clippath` (§4.4): replaces the current path with an outline of the clip
/// region.
pub fn clippath(ctx: &mut Context) -> Result<(), PSError> {
    let clip_path = ctx.gstate().clip.path.clone();
    ctx.gstate_mut().path = clip_path;
    Ok(())
}

pub fn rectclip(ctx: &mut Context) -> Result<(), PSError> {
    let h = pop_num(ctx, "rectclip")?;
    let w = pop_num(ctx, "rectclip")?;
    let y = pop_num(ctx, "rectclip")?;
    let x = pop_num(ctx, "rectclip")?;
    let ctm = ctx.gstate().ctm;
    let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
    let mut path = Path::default();
    for (i, (ux, uy)) in corners.into_iter().enumerate() {
        let (dx, dy) = ctm.transform_point(ux, uy);
        if i == 0 {
            path.move_to(dx, dy);
        } else {
            path.line_to(dx, dy);
        }
    }
    path.close_path();
    apply_clip(ctx, path, WindingRule::NonZero, false);
    Ok(())
}
