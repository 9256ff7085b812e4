//! Graphics-state save/restore and the painting operators (§3.3, §4.4).
//!
//! `fill`/`stroke` (and their even-odd/rect variants) emit a `Path` record
//! followed by a `Fill`/`Stroke` record onto the display list and then clear
//! the current path, matching the PostScript convention that painting
//! implicitly performs a `newpath`. `rectfill`/`rectstroke` paint a rectangle
//! built directly from their operands without ever touching the current path.

use std::collections::HashMap;

use crate::color::Color;
use crate::context::Context;
use crate::display_list::{DisplayRecord, StrokeParams, WindingRule};
use crate::error::{err, ErrorKind, PSError};
use crate::graphics_state::{GraphicsState, LineCap, LineJoin};
use crate::object::Object;
use crate::path::Path;
use crate::stacks::{check_pop, check_push, MAX_GSTATE_STACK};

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "gsave", gsave);
    def(dict, "grestore", grestore);
    def(dict, "grestoreall", grestoreall);
    def(dict, "setlinewidth", setlinewidth);
    def(dict, "currentlinewidth", currentlinewidth);
    def(dict, "setlinecap", setlinecap);
    def(dict, "currentlinecap", currentlinecap);
    def(dict, "setlinejoin", setlinejoin);
    def(dict, "currentlinejoin", currentlinejoin);
    def(dict, "setmiterlimit", setmiterlimit);
    def(dict, "currentmiterlimit", currentmiterlimit);
    def(dict, "setdash", setdash);
    def(dict, "currentdash", currentdash);
    def(dict, "setgray", setgray);
    def(dict, "currentgray", currentgray);
    def(dict, "setrgbcolor", setrgbcolor);
    def(dict, "currentrgbcolor", currentrgbcolor);
    def(dict, "setcmykcolor", setcmykcolor);
    def(dict, "currentcmykcolor", currentcmykcolor);
    def(dict, "fill", fill);
    def(dict, "eofill", eofill);
    def(dict, "stroke", stroke);
    def(dict, "rectfill", rectfill);
    def(dict, "rectstroke", rectstroke);
    def(dict, "showpage", showpage);
    def(dict, "erasepage", erasepage);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_num(ctx: &mut Context, cmd: &str) -> Result<f64, PSError> {
    pop(ctx, cmd)?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))
}

pub fn gsave(ctx: &mut Context) -> Result<(), PSError> {
    check_push(ctx.gstate_stack.len(), MAX_GSTATE_STACK, "gsave", ErrorKind::LimitCheck)?;
    let snapshot = ctx.gstate().clone();
    ctx.gstate_stack.push(snapshot);
    Ok(())
}

pub fn grestore(ctx: &mut Context) -> Result<(), PSError> {
    if ctx.gstate_stack.len() > 1 {
        ctx.gstate_stack.pop();
    }
    Ok(())
}

/// `grestoreall` (§4.4): unwinds to the depth recorded by the most recent
/// `save`, or to the job's initial graphics state if none is outstanding.
pub fn grestoreall(ctx: &mut Context) -> Result<(), PSError> {
    let floor = ctx.vm.top_save_gstate_depth().unwrap_or(1).max(1);
    while ctx.gstate_stack.len() > floor {
        ctx.gstate_stack.pop();
    }
    Ok(())
}

pub fn setlinewidth(ctx: &mut Context) -> Result<(), PSError> {
    let w = pop_num(ctx, "setlinewidth")?;
    ctx.gstate_mut().line_width = w.max(0.0);
    Ok(())
}

pub fn currentlinewidth(ctx: &mut Context) -> Result<(), PSError> {
    ctx.operand_stack.push(Object::Real(ctx.gstate().line_width));
    Ok(())
}

pub fn setlinecap(ctx: &mut Context) -> Result<(), PSError> {
    let n = pop(ctx, "setlinecap")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "setlinecap", "expected an integer"))?;
    ctx.gstate_mut().line_cap = match n {
        0 => LineCap::Butt,
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => return Err(err(ErrorKind::RangeCheck, "setlinecap", "expected 0, 1, or 2")),
    };
    Ok(())
}

pub fn currentlinecap(ctx: &mut Context) -> Result<(), PSError> {
    let n = match ctx.gstate().line_cap {
        LineCap::Butt => 0,
        LineCap::Round => 1,
        LineCap::Square => 2,
    };
    ctx.operand_stack.push(Object::Integer(n));
    Ok(())
}

pub fn setlinejoin(ctx: &mut Context) -> Result<(), PSError> {
    let n = pop(ctx, "setlinejoin")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "setlinejoin", "expected an integer"))?;
    ctx.gstate_mut().line_join = match n {
        0 => LineJoin::Miter,
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => return Err(err(ErrorKind::RangeCheck, "setlinejoin", "expected 0, 1, or 2")),
    };
    Ok(())
}

pub fn currentlinejoin(ctx: &mut Context) -> Result<(), PSError> {
    let n = match ctx.gstate().line_join {
        LineJoin::Miter => 0,
        LineJoin::Round => 1,
        LineJoin::Bevel => 2,
    };
    ctx.operand_stack.push(Object::Integer(n));
    Ok(())
}

pub fn setmiterlimit(ctx: &mut Context) -> Result<(), PSError> {
    let limit = pop_num(ctx, "setmiterlimit")?;
    if limit < 1.0 {
        return Err(err(ErrorKind::RangeCheck, "setmiterlimit", "must be >= 1.0"));
    }
    ctx.gstate_mut().miter_limit = limit;
    Ok(())
}

pub fn currentmiterlimit(ctx: &mut Context) -> Result<(), PSError> {
    ctx.operand_stack.push(Object::Real(ctx.gstate().miter_limit));
    Ok(())
}

pub fn setdash(ctx: &mut Context) -> Result<(), PSError> {
    let offset = pop_num(ctx, "setdash")?;
    let Object::Array(a) = pop(ctx, "setdash")? else { return Err(err(ErrorKind::TypeCheck, "setdash", "expected an array")) };
    let mut pattern = Vec::with_capacity(a.length);
    for v in a.to_vec() {
        let n = v.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, "setdash", "pattern elements must be numbers"))?;
        if n < 0.0 {
            return Err(err(ErrorKind::RangeCheck, "setdash", "negative dash element"));
        }
        pattern.push(n);
    }
    if pattern.iter().all(|v| *v == 0.0) && !pattern.is_empty() {
        return Err(err(ErrorKind::RangeCheck, "setdash", "all-zero dash pattern"));
    }
    ctx.gstate_mut().dash = pattern;
    ctx.gstate_mut().dash_offset = offset;
    Ok(())
}

pub fn currentdash(ctx: &mut Context) -> Result<(), PSError> {
    let pattern = ctx.gstate().dash.iter().copied().map(Object::Real).collect();
    ctx.operand_stack.push(Object::array(pattern));
    ctx.operand_stack.push(Object::Real(ctx.gstate().dash_offset));
    Ok(())
}

pub fn setgray(ctx: &mut Context) -> Result<(), PSError> {
    let g = pop_num(ctx, "setgray")?;
    ctx.gstate_mut().color = Color::gray(g);
    Ok(())
}

pub fn currentgray(ctx: &mut Context) -> Result<(), PSError> {
    let c = ctx.gstate().color;
    let g = match c.space {
        crate::color::ColorSpace::DeviceGray => c.components[0],
        crate::color::ColorSpace::DeviceRGB => 0.3 * c.components[0] + 0.59 * c.components[1] + 0.11 * c.components[2],
        crate::color::ColorSpace::DeviceCMYK => 1.0 - (c.components[0] + c.components[3]).min(1.0),
    };
    ctx.operand_stack.push(Object::Real(g));
    Ok(())
}

pub fn setrgbcolor(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop_num(ctx, "setrgbcolor")?;
    let g = pop_num(ctx, "setrgbcolor")?;
    let r = pop_num(ctx, "setrgbcolor")?;
    ctx.gstate_mut().color = Color::rgb(r, g, b);
    Ok(())
}

pub fn currentrgbcolor(ctx: &mut Context) -> Result<(), PSError> {
    let c = ctx.gstate().color.components;
    ctx.operand_stack.push(Object::Real(c[0]));
    ctx.operand_stack.push(Object::Real(c[1]));
    ctx.operand_stack.push(Object::Real(c[2]));
    Ok(())
}

pub fn setcmykcolor(ctx: &mut Context) -> Result<(), PSError> {
    let k = pop_num(ctx, "setcmykcolor")?;
    let y = pop_num(ctx, "setcmykcolor")?;
    let m = pop_num(ctx, "setcmykcolor")?;
    let c = pop_num(ctx, "setcmykcolor")?;
    ctx.gstate_mut().color = Color::cmyk(c, m, y, k);
    Ok(())
}

pub fn currentcmykcolor(ctx: &mut Context) -> Result<(), PSError> {
    let c = ctx.gstate().color.components;
    ctx.operand_stack.push(Object::Real(c[0]));
    ctx.operand_stack.push(Object::Real(c[1]));
    ctx.operand_stack.push(Object::Real(c[2]));
    ctx.operand_stack.push(Object::Real(c[3]));
    Ok(())
}

fn stroke_params(gs: &GraphicsState) -> StrokeParams {
    let cap = match gs.line_cap {
        LineCap::Butt => 0,
        LineCap::Round => 1,
        LineCap::Square => 2,
    };
    let join = match gs.line_join {
        LineJoin::Miter => 0,
        LineJoin::Round => 1,
        LineJoin::Bevel => 2,
    };
    StrokeParams { line_width: gs.line_width, line_cap: cap, line_join: join, miter_limit: gs.miter_limit, dash_offset: gs.dash_offset }
}

fn paint_fill(ctx: &mut Context, cmd: &str, rule: WindingRule) -> Result<(), PSError> {
    check_pop(ctx.gstate().path.is_empty(), cmd, ErrorKind::NoCurrentPoint)?;
    let path = ctx.gstate().path.clone();
    let color = ctx.gstate().color;
    ctx.display_list.push(DisplayRecord::Path(path));
    ctx.display_list.push(DisplayRecord::Fill { color, rule });
    ctx.gstate_mut().path.clear();
    Ok(())
}

pub fn fill(ctx: &mut Context) -> Result<(), PSError> {
    paint_fill(ctx, "fill", WindingRule::NonZero)
}

pub fn eofill(ctx: &mut Context) -> Result<(), PSError> {
    paint_fill(ctx, "eofill", WindingRule::EvenOdd)
}

pub fn stroke(ctx: &mut Context) -> Result<(), PSError> {
    check_pop(ctx.gstate().path.is_empty(), "stroke", ErrorKind::NoCurrentPoint)?;
    let path = ctx.gstate().path.clone();
    let color = ctx.gstate().color;
    let params = stroke_params(ctx.gstate());
    let dash = ctx.gstate().dash.clone();
    let ctm = ctx.gstate().ctm;
    ctx.display_list.push(DisplayRecord::Path(path));
    ctx.display_list.push(DisplayRecord::Stroke { color, params, dash, ctm });
    ctx.gstate_mut().path.clear();
    Ok(())
}

fn rect_path(ctx: &Context, x: f64, y: f64, w: f64, h: f64) -> Path {
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
    path
}

pub fn rectfill(ctx: &mut Context) -> Result<(), PSError> {
    let h = pop_num(ctx, "rectfill")?;
    let w = pop_num(ctx, "rectfill")?;
    let y = pop_num(ctx, "rectfill")?;
    let x = pop_num(ctx, "rectfill")?;
    let path = rect_path(ctx, x, y, w, h);
    let color = ctx.gstate().color;
    ctx.display_list.push(DisplayRecord::Path(path));
    ctx.display_list.push(DisplayRecord::Fill { color, rule: WindingRule::NonZero });
    Ok(())
}

pub fn rectstroke(ctx: &mut Context) -> Result<(), PSError> {
    let h = pop_num(ctx, "rectstroke")?;
    let w = pop_num(ctx, "rectstroke")?;
    let y = pop_num(ctx, "rectstroke")?;
    let x = pop_num(ctx, "rectstroke")?;
    let path = rect_path(ctx, x, y, w, h);
    let color = ctx.gstate().color;
    let params = stroke_params(ctx.gstate());
    let dash = ctx.gstate().dash.clone();
    let ctm = ctx.gstate().ctm;
    ctx.display_list.push(DisplayRecord::Path(path));
    ctx.display_list.push(DisplayRecord::Stroke { color, params, dash, ctm });
    Ok(())
}

pub fn showpage(ctx: &mut Context) -> Result<(), PSError> {
    ctx.display_list.push(DisplayRecord::ShowPage);
    Ok(())
}

pub fn erasepage(ctx: &mut Context) -> Result<(), PSError> {
    ctx.display_list.push(DisplayRecord::ErasePage);
    Ok(())
}
