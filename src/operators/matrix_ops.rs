//! Coordinate-transform operators (§4.4).
//!
//! A PostScript matrix is an ordinary 6-element numeric array; `array_to_matrix`/
//! `write_matrix` convert between that wire representation and
//! [`crate::matrix::Matrix`]. Every operator here has the two conventional
//! forms: the CTM-mutating form (`tx ty translate`) and the explicit-matrix
//! form (`tx ty matrix translate matrix`) that leaves the CTM untouched and
//! writes into the caller-supplied array instead.

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::matrix::Matrix;
use crate::object::{Object, PArray};
use crate::vm::cow_check_array;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "matrix", matrix_op);
    def(dict, "identmatrix", identmatrix);
    def(dict, "translate", translate);
    def(dict, "scale", scale);
    def(dict, "rotate", rotate);
    def(dict, "concat", concat);
    def(dict, "concatmatrix", concatmatrix);
    def(dict, "transform", transform);
    def(dict, "itransform", itransform);
    def(dict, "dtransform", dtransform);
    def(dict, "idtransform", idtransform);
    def(dict, "invertmatrix", invertmatrix);
    def(dict, "setmatrix", setmatrix);
    def(dict, "currentmatrix", currentmatrix);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_num(ctx: &mut Context, cmd: &str) -> Result<f64, PSError> {
    pop(ctx, cmd)?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))
}

fn array_to_matrix(a: &PArray, cmd: &str) -> Result<Matrix, PSError> {
    if a.length != 6 {
        return Err(err(ErrorKind::RangeCheck, cmd, "matrix array must have 6 elements"));
    }
    let v = a.to_vec();
    let mut out = [0.0; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = v[i].as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "matrix elements must be numbers"))?;
    }
    Ok(Matrix::from_array(out))
}

fn write_matrix(ctx: &mut Context, a: &PArray, m: Matrix, cmd: &str) -> Result<(), PSError> {
    if a.length != 6 {
        return Err(err(ErrorKind::RangeCheck, cmd, "matrix array must have 6 elements"));
    }
    cow_check_array(ctx, a);
    let mut backing = a.backing.borrow_mut();
    for (i, v) in m.to_array().into_iter().enumerate() {
        backing[a.start + i] = Object::Real(v);
    }
    Ok(())
}

fn pop_matrix_array(ctx: &mut Context, cmd: &str) -> Result<PArray, PSError> {
    match pop(ctx, cmd)? {
        Object::Array(a) => Ok(a),
        _ => Err(err(ErrorKind::TypeCheck, cmd, "expected a matrix array")),
    }
}

pub fn matrix_op(ctx: &mut Context) -> Result<(), PSError> {
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    let items = Matrix::IDENTITY.to_array().into_iter().map(Object::Real).collect();
    let a = PArray::new(items, is_global);
    crate::vm::register_new(ctx, a.header.timestamp, is_global);
    ctx.operand_stack.push(Object::Array(a));
    Ok(())
}

pub fn identmatrix(ctx: &mut Context) -> Result<(), PSError> {
    let a = pop_matrix_array(ctx, "identmatrix")?;
    write_matrix(ctx, &a, Matrix::IDENTITY, "identmatrix")?;
    ctx.operand_stack.push(Object::Array(a));
    Ok(())
}

/// Peeks whether the next-to-pop operand is a 6-element matrix array,
/// selecting the explicit-matrix overload.
fn top_is_matrix(ctx: &Context) -> bool {
    matches!(ctx.operand_stack.last(), Some(Object::Array(a)) if a.length == 6)
}

pub fn translate(ctx: &mut Context) -> Result<(), PSError> {
    if top_is_matrix(ctx) {
        let a = pop_matrix_array(ctx, "translate")?;
        let ty = pop_num(ctx, "translate")?;
        let tx = pop_num(ctx, "translate")?;
        write_matrix(ctx, &a, Matrix::translate(tx, ty), "translate")?;
        ctx.operand_stack.push(Object::Array(a));
    } else {
        let ty = pop_num(ctx, "translate")?;
        let tx = pop_num(ctx, "translate")?;
        let new_ctm = Matrix::translate(tx, ty).concat(ctx.gstate().ctm);
        set_ctm(ctx, new_ctm, "translate")?;
    }
    Ok(())
}

pub fn scale(ctx: &mut Context) -> Result<(), PSError> {
    if top_is_matrix(ctx) {
        let a = pop_matrix_array(ctx, "scale")?;
        let sy = pop_num(ctx, "scale")?;
        let sx = pop_num(ctx, "scale")?;
        write_matrix(ctx, &a, Matrix::scale(sx, sy), "scale")?;
        ctx.operand_stack.push(Object::Array(a));
    } else {
        let sy = pop_num(ctx, "scale")?;
        let sx = pop_num(ctx, "scale")?;
        let new_ctm = Matrix::scale(sx, sy).concat(ctx.gstate().ctm);
        set_ctm(ctx, new_ctm, "scale")?;
    }
    Ok(())
}

pub fn rotate(ctx: &mut Context) -> Result<(), PSError> {
    if top_is_matrix(ctx) {
        let a = pop_matrix_array(ctx, "rotate")?;
        let degrees = pop_num(ctx, "rotate")?;
        write_matrix(ctx, &a, Matrix::rotate(degrees), "rotate")?;
        ctx.operand_stack.push(Object::Array(a));
    } else {
        let degrees = pop_num(ctx, "rotate")?;
        let new_ctm = Matrix::rotate(degrees).concat(ctx.gstate().ctm);
        set_ctm(ctx, new_ctm, "rotate")?;
    }
    Ok(())
}

/// `matrix concat -` (§4.4): premultiplies the CTM by `matrix`.
pub fn concat(ctx: &mut Context) -> Result<(), PSError> {
    let a = pop_matrix_array(ctx, "concat")?;
    let m = array_to_matrix(&a, "concat")?;
    let new_ctm = m.concat(ctx.gstate().ctm);
    set_ctm(ctx, new_ctm, "concat")?;
    Ok(())
}

pub fn concatmatrix(ctx: &mut Context) -> Result<(), PSError> {
    let dest = pop_matrix_array(ctx, "concatmatrix")?;
    let m2 = array_to_matrix(&pop_matrix_array(ctx, "concatmatrix")?, "concatmatrix")?;
    let m1 = array_to_matrix(&pop_matrix_array(ctx, "concatmatrix")?, "concatmatrix")?;
    write_matrix(ctx, &dest, m1.concat(m2), "concatmatrix")?;
    ctx.operand_stack.push(Object::Array(dest));
    Ok(())
}

fn set_ctm(ctx: &mut Context, m: Matrix, cmd: &str) -> Result<(), PSError> {
    ctx.gstate_mut().set_ctm(m).ok_or_else(|| err(ErrorKind::UndefinedResult, cmd, "singular matrix"))
}

pub fn transform(ctx: &mut Context) -> Result<(), PSError> {
    let m = if top_is_matrix(ctx) { array_to_matrix(&pop_matrix_array(ctx, "transform")?, "transform")? } else { ctx.gstate().ctm };
    let y = pop_num(ctx, "transform")?;
    let x = pop_num(ctx, "transform")?;
    let (dx, dy) = m.transform_point(x, y);
    ctx.operand_stack.push(Object::Real(dx));
    ctx.operand_stack.push(Object::Real(dy));
    Ok(())
}

pub fn itransform(ctx: &mut Context) -> Result<(), PSError> {
    let m = if top_is_matrix(ctx) {
        array_to_matrix(&pop_matrix_array(ctx, "itransform")?, "itransform")?.invert().ok_or_else(|| err(ErrorKind::UndefinedResult, "itransform", "singular matrix"))?
    } else {
        ctx.gstate().ictm
    };
    let y = pop_num(ctx, "itransform")?;
    let x = pop_num(ctx, "itransform")?;
    let (ux, uy) = m.transform_point(x, y);
    ctx.operand_stack.push(Object::Real(ux));
    ctx.operand_stack.push(Object::Real(uy));
    Ok(())
}

pub fn dtransform(ctx: &mut Context) -> Result<(), PSError> {
    let m = if top_is_matrix(ctx) { array_to_matrix(&pop_matrix_array(ctx, "dtransform")?, "dtransform")? } else { ctx.gstate().ctm };
    let dy = pop_num(ctx, "dtransform")?;
    let dx = pop_num(ctx, "dtransform")?;
    let (rx, ry) = m.transform_delta(dx, dy);
    ctx.operand_stack.push(Object::Real(rx));
    ctx.operand_stack.push(Object::Real(ry));
    Ok(())
}

pub fn idtransform(ctx: &mut Context) -> Result<(), PSError> {
    let m = if top_is_matrix(ctx) {
        array_to_matrix(&pop_matrix_array(ctx, "idtransform")?, "idtransform")?.invert().ok_or_else(|| err(ErrorKind::UndefinedResult, "idtransform", "singular matrix"))?
    } else {
        ctx.gstate().ictm
    };
    let dy = pop_num(ctx, "idtransform")?;
    let dx = pop_num(ctx, "idtransform")?;
    let (rx, ry) = m.transform_delta(dx, dy);
    ctx.operand_stack.push(Object::Real(rx));
    ctx.operand_stack.push(Object::Real(ry));
    Ok(())
}

pub fn invertmatrix(ctx: &mut Context) -> Result<(), PSError> {
    let dest = pop_matrix_array(ctx, "invertmatrix")?;
    let src = array_to_matrix(&pop_matrix_array(ctx, "invertmatrix")?, "invertmatrix")?;
    let inv = src.invert().ok_or_else(|| err(ErrorKind::UndefinedResult, "invertmatrix", "singular matrix"))?;
    write_matrix(ctx, &dest, inv, "invertmatrix")?;
    ctx.operand_stack.push(Object::Array(dest));
    Ok(())
}

pub fn setmatrix(ctx: &mut Context) -> Result<(), PSError> {
    let a = pop_matrix_array(ctx, "setmatrix")?;
    let m = array_to_matrix(&a, "setmatrix")?;
    set_ctm(ctx, m, "setmatrix")?;
    Ok(())
}

pub fn currentmatrix(ctx: &mut Context) -> Result<(), PSError> {
    let a = pop_matrix_array(ctx, "currentmatrix")?;
    let ctm = ctx.gstate().ctm;
    write_matrix(ctx, &a, ctm, "currentmatrix")?;
    ctx.operand_stack.push(Object::Array(a));
    Ok(())
}
