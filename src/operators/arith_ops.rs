//! Arithmetic and bit operators (§4.1).

use std::collections::HashMap;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::Object;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "add", add);
    def(dict, "sub", sub);
    def(dict, "mul", mul);
    def(dict, "div", div);
    def(dict, "idiv", idiv);
    def(dict, "mod", modulo);
    def(dict, "neg", neg);
    def(dict, "abs", abs);
    def(dict, "ceiling", ceiling);
    def(dict, "floor", floor);
    def(dict, "round", round);
    def(dict, "truncate", truncate);
    def(dict, "sqrt", sqrt);
    def(dict, "exp", exp);
    def(dict, "ln", ln);
    def(dict, "log", log10);
    def(dict, "sin", sin);
    def(dict, "cos", cos);
    def(dict, "atan", atan);
}

fn pop_num(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_f64(ctx: &mut Context, cmd: &str) -> Result<f64, PSError> {
    pop_num(ctx, cmd)?.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))
}

/// Pushes an Integer result if both operands were Integer and the
/// mathematical result stays in range, otherwise a Real (§3.1 numeric
/// coercion rules).
fn push_numeric_result(ctx: &mut Context, both_int: bool, v: f64) {
    if both_int && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        ctx.operand_stack.push(Object::Integer(v as i64));
    } else {
        ctx.operand_stack.push(Object::Real(v));
    }
}

fn binary(ctx: &mut Context, cmd: &str, f: impl Fn(f64, f64) -> f64) -> Result<(), PSError> {
    let b = pop_num(ctx, cmd)?;
    let a = pop_num(ctx, cmd)?;
    let both_int = matches!(a, Object::Integer(_)) && matches!(b, Object::Integer(_));
    let (a, b) = (a.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))?, b.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))?);
    push_numeric_result(ctx, both_int, f(a, b));
    Ok(())
}

pub fn add(ctx: &mut Context) -> Result<(), PSError> {
    binary(ctx, "add", |a, b| a + b)
}

pub fn sub(ctx: &mut Context) -> Result<(), PSError> {
    binary(ctx, "sub", |a, b| a - b)
}

pub fn mul(ctx: &mut Context) -> Result<(), PSError> {
    binary(ctx, "mul", |a, b| a * b)
}

/// `div` always yields a Real, even for two Integers (§4.1 glossary "div").
pub fn div(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop_f64(ctx, "div")?;
    let a = pop_f64(ctx, "div")?;
    if b == 0.0 {
        return Err(err(ErrorKind::UndefinedResult, "div", "division by zero"));
    }
    ctx.operand_stack.push(Object::Real(a / b));
    Ok(())
}

pub fn idiv(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop_num(ctx, "idiv")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "idiv", "expected integers"))?;
    let a = pop_num(ctx, "idiv")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "idiv", "expected integers"))?;
    if b == 0 {
        return Err(err(ErrorKind::UndefinedResult, "idiv", "division by zero"));
    }
    ctx.operand_stack.push(Object::Integer(a / b));
    Ok(())
}

pub fn modulo(ctx: &mut Context) -> Result<(), PSError> {
    let b = pop_num(ctx, "mod")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "mod", "expected integers"))?;
    let a = pop_num(ctx, "mod")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "mod", "expected integers"))?;
    if b == 0 {
        return Err(err(ErrorKind::UndefinedResult, "mod", "division by zero"));
    }
    ctx.operand_stack.push(Object::Integer(a % b));
    Ok(())
}

fn unary(ctx: &mut Context, cmd: &str, f: impl Fn(f64) -> f64) -> Result<(), PSError> {
    let v = pop_num(ctx, cmd)?;
    let is_int = matches!(v, Object::Integer(_));
    let v = v.as_f64().ok_or_else(|| err(ErrorKind::TypeCheck, cmd, "expected a number"))?;
    push_numeric_result(ctx, is_int, f(v));
    Ok(())
}

pub fn neg(ctx: &mut Context) -> Result<(), PSError> {
    unary(ctx, "neg", |v| -v)
}

pub fn abs(ctx: &mut Context) -> Result<(), PSError> {
    unary(ctx, "abs", f64::abs)
}

pub fn ceiling(ctx: &mut Context) -> Result<(), PSError> {
    unary(ctx, "ceiling", f64::ceil)
}

pub fn floor(ctx: &mut Context) -> Result<(), PSError> {
    unary(ctx, "floor", f64::floor)
}

pub fn round(ctx: &mut Context) -> Result<(), PSError> {
    unary(ctx, "round", f64::round)
}

pub fn truncate(ctx: &mut Context) -> Result<(), PSError> {
    unary(ctx, "truncate", f64::trunc)
}

pub fn sqrt(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop_f64(ctx, "sqrt")?;
    if v < 0.0 {
        return Err(err(ErrorKind::RangeCheck, "sqrt", "negative operand"));
    }
    ctx.operand_stack.push(Object::Real(v.sqrt()));
    Ok(())
}

pub fn exp(ctx: &mut Context) -> Result<(), PSError> {
    let exponent = pop_f64(ctx, "exp")?;
    let base = pop_f64(ctx, "exp")?;
    ctx.operand_stack.push(Object::Real(base.powf(exponent)));
    Ok(())
}

pub fn ln(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop_f64(ctx, "ln")?;
    ctx.operand_stack.push(Object::Real(v.ln()));
    Ok(())
}

pub fn log10(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop_f64(ctx, "log")?;
    ctx.operand_stack.push(Object::Real(v.log10()));
    Ok(())
}

pub fn sin(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop_f64(ctx, "sin")?;
    ctx.operand_stack.push(Object::Real(v.to_radians().sin()));
    Ok(())
}

pub fn cos(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop_f64(ctx, "cos")?;
    ctx.operand_stack.push(Object::Real(v.to_radians().cos()));
    Ok(())
}

/// `atan`: `num den atan` -> angle in degrees, normalized to `[0, 360)`
/// (§4.1 glossary "atan").
pub fn atan(ctx: &mut Context) -> Result<(), PSError> {
    let den = pop_f64(ctx, "atan")?;
    let num = pop_f64(ctx, "atan")?;
    let mut degrees = num.atan2(den).to_degrees();
    if degrees < 0.0 {
        degrees += 360.0;
    }
    ctx.operand_stack.push(Object::Real(degrees));
    Ok(())
}
