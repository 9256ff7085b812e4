//! PostForge core: the execution engine, VM, graphics-state machine, and
//! font/glyph pipeline for a PostScript Level 2 interpreter.
//!
//! # Architecture
//!
//! - **object**: the tagged `Object` union every value in the system is
//!   represented as, plus the composite backing stores (`PString`, `PArray`,
//!   `PDict`, `PFile`) save/restore protects.
//! - **context**: `Context`, the one struct every operator and the dispatch
//!   loop share — the four stacks, VM state, display list, font/glyph
//!   tables, system parameters.
//! - **vm**: save/restore and the copy-on-write reference-map protocol.
//! - **engine**: the dispatch loop and the seven loop-header kinds.
//! - **tokenizer**: the incremental scanner driving `Object::File`/`token`.
//! - **graphics_state** / **matrix** / **path** / **display_list**: the
//!   graphics-state machine and its back-end-agnostic output contract.
//! - **fonts**: the Type 1/2/3/0/42 glyph pipeline and the two-level cache.
//! - **operators**: every operator category, registered into a systemdict
//!   analogue by `operators::install`.
//! - **job**: job-server encapsulation (`execjob`/`startjob`).
//!
//! # Example
//!
//! ```rust
//! use postforge_core::context::Context;
//! use postforge_core::operators;
//! use postforge_core::engine;
//! use postforge_core::object::Object;
//!
//! let mut ctx = Context::new();
//! operators::install(&mut ctx);
//! ctx.execution_stack.push(Object::name("add"));
//! ctx.operand_stack.push(Object::Integer(3));
//! ctx.operand_stack.push(Object::Integer(4));
//! engine::run(&mut ctx);
//! assert_eq!(ctx.operand_stack.pop().unwrap().as_i64(), Some(7));
//! ```

pub mod color;
pub mod context;
pub mod display_list;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod glyph_cache;
pub mod graphics_state;
pub mod job;
pub mod matrix;
pub mod object;
pub mod operators;
pub mod path;
pub mod stacks;
pub mod systemparams;
pub mod tokenizer;
pub mod vm;
