//! Path-construction operators (§3.3, §4.4).
//!
//! `GraphicsState::path` is stored in device space (see `path.rs`), so every
//! operator here transforms its user-space operands through the CTM before
//! appending. `r`-prefixed operators resolve their displacement against the
//! user-space current point, which is recovered by running the device-space
//! current point back through the inverse CTM.

use std::collections::HashMap;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::{LoopHeader, LoopKind, Object};
use crate::path::PathElement;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "newpath", newpath);
    def(dict, "moveto", moveto);
    def(dict, "lineto", lineto);
    def(dict, "curveto", curveto);
    def(dict, "closepath", closepath);
    def(dict, "rmoveto", rmoveto);
    def(dict, "rlineto", rlineto);
    def(dict, "rcurveto", rcurveto);
    def(dict, "arc", arc);
    def(dict, "arcn", arcn);
    def(dict, "currentpoint", currentpoint);
    def(dict, "pathforall", pathforall);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_num(ctx: &mut Context, cmd: &str) -> Result<f64, PSError> {
    pop(ctx, cmd)?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))
}

pub(crate) fn current_point_user_space(ctx: &Context, cmd: &str) -> Result<(f64, f64), PSError> {
    let (dx, dy) = ctx.gstate().path.current_point().ok_or_else(|| err(ErrorKind::NoCurrentPoint, cmd, "no current point"))?;
    Ok(ctx.gstate().ictm.transform_point(dx, dy))
}

pub fn newpath(ctx: &mut Context) -> Result<(), PSError> {
    ctx.gstate_mut().path.clear();
    Ok(())
}

pub fn moveto(ctx: &mut Context) -> Result<(), PSError> {
    let y = pop_num(ctx, "moveto")?;
    let x = pop_num(ctx, "moveto")?;
    let (dx, dy) = ctx.gstate().ctm.transform_point(x, y);
    ctx.gstate_mut().path.move_to(dx, dy);
    Ok(())
}

pub fn lineto(ctx: &mut Context) -> Result<(), PSError> {
    let y = pop_num(ctx, "lineto")?;
    let x = pop_num(ctx, "lineto")?;
    if ctx.gstate().path.current_point().is_none() {
        return Err(err(ErrorKind::NoCurrentPoint, "lineto", "no current point"));
    }
    let (dx, dy) = ctx.gstate().ctm.transform_point(x, y);
    ctx.gstate_mut().path.line_to(dx, dy);
    Ok(())
}

pub fn curveto(ctx: &mut Context) -> Result<(), PSError> {
    let y3 = pop_num(ctx, "curveto")?;
    let x3 = pop_num(ctx, "curveto")?;
    let y2 = pop_num(ctx, "curveto")?;
    let x2 = pop_num(ctx, "curveto")?;
    let y1 = pop_num(ctx, "curveto")?;
    let x1 = pop_num(ctx, "curveto")?;
    if ctx.gstate().path.current_point().is_none() {
        return Err(err(ErrorKind::NoCurrentPoint, "curveto", "no current point"));
    }
    let ctm = ctx.gstate().ctm;
    let (dx1, dy1) = ctm.transform_point(x1, y1);
    let (dx2, dy2) = ctm.transform_point(x2, y2);
    let (dx3, dy3) = ctm.transform_point(x3, y3);
    ctx.gstate_mut().path.curve_to(dx1, dy1, dx2, dy2, dx3, dy3);
    Ok(())
}

pub fn closepath(ctx: &mut Context) -> Result<(), PSError> {
    ctx.gstate_mut().path.close_path();
    Ok(())
}

pub fn rmoveto(ctx: &mut Context) -> Result<(), PSError> {
    let dy = pop_num(ctx, "rmoveto")?;
    let dx = pop_num(ctx, "rmoveto")?;
    let (cx, cy) = current_point_user_space(ctx, "rmoveto")?;
    let (ux, uy) = ctx.gstate().ctm.transform_point(cx + dx, cy + dy);
    ctx.gstate_mut().path.move_to(ux, uy);
    Ok(())
}

pub fn rlineto(ctx: &mut Context) -> Result<(), PSError> {
    let dy = pop_num(ctx, "rlineto")?;
    let dx = pop_num(ctx, "rlineto")?;
    let (cx, cy) = current_point_user_space(ctx, "rlineto")?;
    let (ux, uy) = ctx.gstate().ctm.transform_point(cx + dx, cy + dy);
    ctx.gstate_mut().path.line_to(ux, uy);
    Ok(())
}

pub fn rcurveto(ctx: &mut Context) -> Result<(), PSError> {
    let dy3 = pop_num(ctx, "rcurveto")?;
    let dx3 = pop_num(ctx, "rcurveto")?;
    let dy2 = pop_num(ctx, "rcurveto")?;
    let dx2 = pop_num(ctx, "rcurveto")?;
    let dy1 = pop_num(ctx, "rcurveto")?;
    let dx1 = pop_num(ctx, "rcurveto")?;
    let (cx, cy) = current_point_user_space(ctx, "rcurveto")?;
    let ctm = ctx.gstate().ctm;
    let (ux1, uy1) = ctm.transform_point(cx + dx1, cy + dy1);
    let (ux2, uy2) = ctm.transform_point(cx + dx2, cy + dy2);
    let (ux3, uy3) = ctm.transform_point(cx + dx3, cy + dy3);
    ctx.gstate_mut().path.curve_to(ux1, uy1, ux2, uy2, ux3, uy3);
    Ok(())
}

/// Appends a circular arc as four cubic Bezier segments at most (one per
/// quadrant crossed), the usual device-independent approximation named in
/// §4.4 for `arc`/`arcn`. `negative` selects the clockwise (`arcn`) sweep.
fn arc_impl(ctx: &mut Context, cmd: &str, negative: bool) -> Result<(), PSError> {
    let angle2 = pop_num(ctx, cmd)?;
    let angle1 = pop_num(ctx, cmd)?;
    let r = pop_num(ctx, cmd)?;
    let y = pop_num(ctx, cmd)?;
    let x = pop_num(ctx, cmd)?;
    if r < 0.0 {
        return Err(err(ErrorKind::RangeCheck, cmd, "negative radius"));
    }

    let mut start = angle1.to_radians();
    let mut end = angle2.to_radians();
    if negative {
        while end > start {
            end -= std::f64::consts::TAU;
        }
    } else {
        while end < start {
            end += std::f64::consts::TAU;
        }
    }

    let (sx, sy) = (x + r * start.cos(), y + r * start.sin());
    let ctm = ctx.gstate().ctm;
    let (dsx, dsy) = ctm.transform_point(sx, sy);
    if ctx.gstate().path.current_point().is_some() {
        ctx.gstate_mut().path.line_to(dsx, dsy);
    } else {
        ctx.gstate_mut().path.move_to(dsx, dsy);
    }

    let total = end - start;
    let segments = ((total.abs() / (std::f64::consts::PI / 2.0)).ceil().max(1.0)) as usize;
    let step = total / segments as f64;
    let mut theta = start;
    for _ in 0..segments {
        let next = theta + step;
        let (p0x, p0y) = (x + r * theta.cos(), y + r * theta.sin());
        let (p3x, p3y) = (x + r * next.cos(), y + r * next.sin());
        let alpha = (step / 4.0).tan() * (4.0 / 3.0);
        let (t0x, t0y) = (-r * theta.sin(), r * theta.cos());
        let (t3x, t3y) = (-r * next.sin(), r * next.cos());
        let c1 = (p0x + alpha * t0x, p0y + alpha * t0y);
        let c2 = (p3x - alpha * t3x, p3y - alpha * t3y);
        let (dc1x, dc1y) = ctm.transform_point(c1.0, c1.1);
        let (dc2x, dc2y) = ctm.transform_point(c2.0, c2.1);
        let (dp3x, dp3y) = ctm.transform_point(p3x, p3y);
        ctx.gstate_mut().path.curve_to(dc1x, dc1y, dc2x, dc2y, dp3x, dp3y);
        theta = next;
    }
    Ok(())
}

pub fn arc(ctx: &mut Context) -> Result<(), PSError> {
    arc_impl(ctx, "arc", false)
}

pub fn arcn(ctx: &mut Context) -> Result<(), PSError> {
    arc_impl(ctx, "arcn", true)
}

pub fn currentpoint(ctx: &mut Context) -> Result<(), PSError> {
    let (x, y) = current_point_user_space(ctx, "currentpoint")?;
    ctx.operand_stack.push(Object::Real(x));
    ctx.operand_stack.push(Object::Real(y));
    Ok(())
}

/// `proc pathforall -` (§4.4 glossary "pathforall"): `proc` is a literal
/// 4-element array `[moveproc lineproc curveproc closeproc]`, dispatched per
/// element by `engine::advance_loop`'s `PathForAll` arm.
pub fn pathforall(ctx: &mut Context) -> Result<(), PSError> {
    let proc = pop(ctx, "pathforall")?;
    let elements: Vec<PathElement> = ctx.gstate().path.subpaths.iter().flat_map(|s| s.elements.iter().copied()).collect();
    ctx.execution_stack.push(Object::Loop(Box::new(LoopHeader {
        kind: LoopKind::PathForAll { elements: Rc::new(elements), cursor: 0 },
        proc,
        saved_font: ctx.current_font,
    })));
    Ok(())
}
