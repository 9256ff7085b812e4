//! Operator registration (§4.1 "Operator dispatch").
//!
//! Each category module exposes a `register(dict: &mut HashMap<String,
//! Object>)` that inserts its operators as `Object::Operator` values under
//! their PostScript name. [`install`] builds the bottom dictionary of the
//! dictionary stack (this core's analogue of `systemdict`) from every
//! category and pushes it, followed by a fresh `userdict`, matching the
//! two-dictionary baseline `begin`/`end` expects to find already on the
//! stack at startup (§2 "Dictionary stack").

pub mod arith_ops;
pub mod array_ops;
pub mod bool_ops;
pub mod clip_ops;
pub mod control_ops;
pub mod dict_ops;
pub mod file_ops;
pub mod font_ops;
pub mod graphics_ops;
pub mod matrix_ops;
pub mod path_ops;
pub mod show_ops;
pub mod stack_ops;
pub mod string_ops;
pub mod vm_ops;

use std::collections::HashMap;

use crate::context::Context;
use crate::job;
use crate::object::{Object, OperatorObj, PDict};

pub fn def(dict: &mut HashMap<String, Object>, name: &'static str, func: crate::context::OperatorFn) {
    dict.insert(name.to_string(), Object::Operator(OperatorObj { name, func }));
}

pub fn install(ctx: &mut Context) {
    let mut system = HashMap::new();
    stack_ops::register(&mut system);
    arith_ops::register(&mut system);
    bool_ops::register(&mut system);
    array_ops::register(&mut system);
    string_ops::register(&mut system);
    dict_ops::register(&mut system);
    control_ops::register(&mut system);
    matrix_ops::register(&mut system);
    path_ops::register(&mut system);
    graphics_ops::register(&mut system);
    clip_ops::register(&mut system);
    file_ops::register(&mut system);
    font_ops::register(&mut system);
    show_ops::register(&mut system);
    vm_ops::register(&mut system);
    job::register(&mut system);

    let max_length = system.len();
    let system_dict = PDict { header: crate::object::CompositeHeader::new(true), map: std::rc::Rc::new(std::cell::RefCell::new(system)), max_length };
    ctx.dict_stack.push(system_dict);
    ctx.dict_stack.push(PDict::new(200, false)); // userdict
}
