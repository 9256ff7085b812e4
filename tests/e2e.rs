//! End-to-end scenarios driving the interpreter the way a real job would:
//! through the tokenizer and dispatch loop, not by calling operator
//! functions directly.

use std::collections::HashMap;
use std::rc::Rc;

use postforge_core::context::Context;
use postforge_core::display_list::DisplayRecord;
use postforge_core::engine;
use postforge_core::fonts::{self, type1, FontDict, FontProgram, FontType};
use postforge_core::matrix::Matrix;
use postforge_core::object::Object;
use postforge_core::operators;
use postforge_core::tokenizer;

fn run_source(src: &str) -> Context {
    let mut ctx = Context::new();
    operators::install(&mut ctx);
    ctx.execution_stack.push(Object::File(tokenizer::memory_reader(src.as_bytes().to_vec())));
    engine::run(&mut ctx);
    ctx
}

#[test]
fn integer_arithmetic() {
    let mut ctx = run_source("3 4 add");
    assert_eq!(ctx.operand_stack.pop().unwrap().as_i64(), Some(7));
    assert!(ctx.operand_stack.is_empty());
}

#[test]
fn save_restore_reverts_local_vm_mutation() {
    let mut ctx = run_source(
        "/a 3 array def
         a 0 10 put
         save /s exch def
         a 0 20 put
         s restore
         a 0 get",
    );
    assert_eq!(ctx.operand_stack.pop().unwrap().as_i64(), Some(10));
}

#[test]
fn fill_and_stroke_emit_expected_display_records_and_grestore_reverts_state() {
    let ctx = run_source(
        "gsave
           1 setlinewidth
           0 0 moveto 10 0 lineto 10 10 lineto closepath
           fill
           0.5 setlinewidth
           stroke
         grestore
         currentlinewidth",
    );

    let fills = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::Fill { .. })).count();
    let strokes = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::Stroke { .. })).count();
    assert_eq!(fills, 1);
    assert_eq!(strokes, 1);

    // grestore must have reverted setlinewidth back to the default (1.0),
    // not left the 0.5 set inside the gsave/grestore bracket.
    let mut ctx = ctx;
    assert_eq!(ctx.operand_stack.pop().unwrap().as_f64(), Some(1.0));
}

#[test]
fn clip_version_only_advances_on_an_actual_region_change() {
    let ctx = run_source(
        "0 0 10 10 rectclip
         0 0 10 10 rectclip
         0 0 20 20 rectclip",
    );

    let clip_elements = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::ClipElement { .. })).count();
    // the repeated identical rectclip must not emit a second ClipElement.
    assert_eq!(clip_elements, 2);
    assert_eq!(ctx.gstate().clip.version, 2);
}

/// Hand-built Type 1 CharString for glyph "A", decoding to:
/// `0 500 hsbw 100 100 rmoveto 200 0 rlineto closepath endchar`
fn test_charstring_plain() -> Vec<u8> {
    vec![139, 248, 136, 13, 239, 239, 21, 247, 92, 139, 5, 9, 14]
}

fn install_test_font(ctx: &mut Context) {
    let plain = test_charstring_plain();
    let encrypted = type1::encrypt_charstring(&plain, 4);

    let mut char_strings = HashMap::new();
    char_strings.insert("A".to_string(), encrypted);

    let mut encoding = HashMap::new();
    encoding.insert(b'A', "A".to_string());

    let program = FontProgram::Type1 { char_strings, subrs: Vec::new(), len_iv: 4, encoding };
    let font = FontDict {
        id: fonts::next_font_id(),
        font_type: FontType::Type1,
        font_matrix: Matrix::scale(0.001, 0.001),
        font_name: Some("TestFont".to_string()),
        program: Rc::new(program),
        paint_type: 0,
    };
    let id = ctx.fonts.insert(font);
    ctx.current_font = Some(id);
}

#[test]
fn repeated_glyph_hits_the_path_cache() {
    let mut ctx = Context::new();
    operators::install(&mut ctx);
    install_test_font(&mut ctx);

    ctx.execution_stack.push(Object::File(tokenizer::memory_reader(b"0 0 moveto (AA) show".to_vec())));
    engine::run(&mut ctx);

    let starts = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::GlyphStart { .. })).count();
    let ends = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::GlyphEnd)).count();
    let refs = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::GlyphRef { .. })).count();
    let fills = ctx.display_list.records.iter().filter(|r| matches!(r, DisplayRecord::Fill { .. })).count();

    assert_eq!(starts, 1, "first occurrence must build and paint the outline");
    assert_eq!(ends, 1);
    assert_eq!(fills, 1);
    assert_eq!(refs, 1, "second occurrence at the same position/scale must hit the path cache");
}

#[test]
fn repeat_with_a_large_count_does_not_overflow_the_native_stack() {
    let mut ctx = run_source("0 200000 { 1 add } repeat");
    assert_eq!(ctx.operand_stack.pop().unwrap().as_i64(), Some(200000));
}
