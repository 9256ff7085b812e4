//! The incremental scanner (§4.1 "Scanning", glossary "Tokenizer").
//!
//! Unlike a conventional two-pass lexer/parser, [`next_object`] pulls exactly
//! one `Object` per call from a [`PFile`] — the same interface drives an on-
//! disk file, an in-memory string run through `token`, and filter streams
//! alike. `{`/`}` and `<<`/`>>` are the only constructs that read ahead of a
//! single token: a procedure or a dict-construction pair must be fully
//! available before the object they produce can be handed back, so the
//! scanner recurses on itself up to the matching close token and assembles
//! the composite before returning.

use std::io::Read;
use std::rc::Rc;

use crate::error::{err, ErrorKind, PSError};
use crate::object::{Attr, FileBacking, Object, PArray, PFile, PString};
use crate::vm::register_new;

const DELIMS: &[u8] = b"()<>[]{}/%";

fn is_delim(b: u8) -> bool {
    b.is_ascii_whitespace() || DELIMS.contains(&b)
}

fn read_byte(file: &PFile) -> Option<u8> {
    if let Some(b) = file.putback.borrow_mut().take() {
        return Some(b);
    }
    match &*file.inner {
        FileBacking::Real(f) => {
            let mut buf = [0u8; 1];
            f.borrow_mut().read_exact(&mut buf).ok().map(|_| buf[0])
        }
        FileBacking::Memory(c) => {
            let mut buf = [0u8; 1];
            c.borrow_mut().read_exact(&mut buf).ok().map(|_| buf[0])
        }
        FileBacking::Stdin(s) => {
            let mut buf = [0u8; 1];
            s.borrow_mut().read_exact(&mut buf).ok().map(|_| buf[0])
        }
        FileBacking::Stdout | FileBacking::Stderr => None,
    }
}

fn unread_byte(file: &PFile, b: u8) {
    *file.putback.borrow_mut() = Some(b);
}

fn skip_whitespace_and_comments(file: &PFile) {
    while let Some(b) = read_byte(file) {
        if b == b'%' {
            while let Some(c) = read_byte(file) {
                if c == b'\n' || c == b'\r' {
                    break;
                }
            }
            continue;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        unread_byte(file, b);
        break;
    }
}

/// Reads the next token from `file`, consuming leading whitespace/comments
/// first. Returns `Ok(None)` at end of stream. `is_global` selects which VM
/// a freshly constructed composite (string, array, dict-to-be) registers
/// into, per the current `vm_alloc_mode` (§5).
pub fn next_object(file: &PFile, is_global: bool) -> Result<Option<Object>, PSError> {
    skip_whitespace_and_comments(file);
    let Some(b) = read_byte(file) else { return Ok(None) };

    match b {
        b'(' => Ok(Some(read_literal_string(file, is_global)?)),
        b'<' => {
            if peek_is(file, b'<') {
                read_byte(file);
                Ok(Some(Object::name("<<")))
            } else {
                Ok(Some(read_hex_string(file, is_global)?))
            }
        }
        b'>' => {
            if peek_is(file, b'>') {
                read_byte(file);
                Ok(Some(Object::name(">>")))
            } else {
                Err(err(ErrorKind::SyntaxError, "token", "unexpected '>'"))
            }
        }
        b'[' => Ok(Some(Object::name("["))),
        b']' => Ok(Some(Object::name("]"))),
        b'{' => Ok(Some(read_procedure(file, is_global)?)),
        b'}' => Err(err(ErrorKind::SyntaxError, "token", "unexpected '}'")),
        b'/' => {
            if peek_is(file, b'/') {
                read_byte(file);
                // `//name` (immediately-evaluated name) — treated the same as
                // an ordinary literal name by this core; immediate lookup at
                // scan time is a convenience the dispatch loop doesn't need.
            }
            let name = read_bare_token(file);
            Ok(Some(Object::literal_name(&name)))
        }
        _ => {
            unread_byte(file, b);
            let tok = read_bare_token(file);
            Ok(Some(classify_bare_token(&tok)))
        }
    }
}

fn peek_is(file: &PFile, want: u8) -> bool {
    match read_byte(file) {
        Some(b) if b == want => true,
        Some(b) => {
            unread_byte(file, b);
            false
        }
        None => false,
    }
}

fn read_bare_token(file: &PFile) -> String {
    let mut bytes = Vec::new();
    while let Some(b) = read_byte(file) {
        if is_delim(b) {
            unread_byte(file, b);
            break;
        }
        bytes.push(b);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Numbers first (integer, real, or `radix#digits`), falling back to an
/// executable name (§4.1 "Scanning").
fn classify_bare_token(tok: &str) -> Object {
    if let Ok(i) = tok.parse::<i64>() {
        return Object::Integer(i);
    }
    if let Ok(f) = tok.parse::<f64>() {
        if tok.chars().any(|c| c == '.' || c == 'e' || c == 'E') {
            return Object::Real(f);
        }
    }
    if let Some(hash) = tok.find('#') {
        if let (Ok(radix), Some(digits)) = (tok[..hash].parse::<u32>(), tok.get(hash + 1..)) {
            if (2..=36).contains(&radix) {
                if let Ok(v) = i64::from_str_radix(digits, radix) {
                    return Object::Integer(v);
                }
            }
        }
    }
    Object::name(tok)
}

fn read_literal_string(file: &PFile, is_global: bool) -> Result<Object, PSError> {
    let mut out = Vec::new();
    let mut depth = 1;
    while let Some(b) = read_byte(file) {
        match b {
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(make_string(out, is_global));
                }
                out.push(b);
            }
            b'\\' => {
                let Some(e) = read_byte(file) else { break };
                match e {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'\\' => out.push(b'\\'),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    b'\n' => {} // line continuation: escaped newline is elided
                    b'0'..=b'7' => {
                        let mut val = (e - b'0') as u32;
                        for _ in 0..2 {
                            match read_byte(file) {
                                Some(d @ b'0'..=b'7') => val = val * 8 + (d - b'0') as u32,
                                Some(other) => {
                                    unread_byte(file, other);
                                    break;
                                }
                                None => break,
                            }
                        }
                        out.push(val as u8);
                    }
                    other => out.push(other),
                }
            }
            _ => out.push(b),
        }
    }
    Err(err(ErrorKind::SyntaxError, "token", "unterminated literal string"))
}

fn read_hex_string(file: &PFile, is_global: bool) -> Result<Object, PSError> {
    let mut digits = Vec::new();
    loop {
        let Some(b) = read_byte(file) else {
            return Err(err(ErrorKind::SyntaxError, "token", "unterminated hex string"));
        };
        if b == b'>' {
            break;
        }
        if b.is_ascii_hexdigit() {
            digits.push(b);
        } else if !b.is_ascii_whitespace() {
            return Err(err(ErrorKind::SyntaxError, "token", "invalid hex string digit"));
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let hi = (pair[0] as char).to_digit(16).unwrap();
        let lo = (pair[1] as char).to_digit(16).unwrap();
        out.push((hi * 16 + lo) as u8);
    }
    Ok(make_string(out, is_global))
}

fn make_string(bytes: Vec<u8>, is_global: bool) -> Object {
    Object::String(PString::new(bytes, is_global))
}

/// Reads a `{ ... }` procedure body by recursing on [`next_object`] until the
/// matching `}`, then wraps the collected items as an executable array
/// (§3.1 "procedures parse as a literal Array whose attr is Executable").
fn read_procedure(file: &PFile, is_global: bool) -> Result<Object, PSError> {
    let mut items = Vec::new();
    loop {
        skip_whitespace_and_comments(file);
        let Some(b) = read_byte(file) else {
            return Err(err(ErrorKind::SyntaxError, "token", "unterminated procedure"));
        };
        if b == b'}' {
            break;
        }
        unread_byte(file, b);
        match next_object(file, is_global)? {
            Some(obj) => items.push(obj),
            None => return Err(err(ErrorKind::SyntaxError, "token", "unterminated procedure")),
        }
    }
    let mut arr = PArray::new(items, is_global);
    arr.attr = Attr::Executable;
    Ok(Object::Array(arr))
}

/// Reads a single raw byte, bypassing token classification — backs the
/// `read` operator (§3.1 "File").
pub fn read_one_byte(file: &PFile) -> Option<u8> {
    read_byte(file)
}

/// Bytes actually consumed from a [`memory_reader`]'s backing cursor, net of
/// any byte parked in `putback` — the boundary `token` needs to slice off the
/// unconsumed remainder of its string operand (§4.1 "Scanning").
pub fn memory_reader_position(file: &PFile) -> usize {
    let pos = match &*file.inner {
        FileBacking::Memory(c) => c.borrow().position() as usize,
        _ => 0,
    };
    pos.saturating_sub(if file.putback.borrow().is_some() { 1 } else { 0 })
}

/// Wraps a byte slice as an in-memory readable stream (e.g. for the `token`
/// operator applied to a string).
pub fn memory_reader(bytes: Vec<u8>) -> PFile {
    PFile {
        header: crate::object::CompositeHeader::new(false),
        inner: Rc::new(FileBacking::Memory(std::cell::RefCell::new(std::io::Cursor::new(bytes)))),
        mode: crate::object::FileMode::Read,
        is_real_file: false,
        putback: Rc::new(std::cell::RefCell::new(None)),
    }
}

/// Registers a freshly scanned composite's timestamp into the right VM
/// reference map; call once after `next_object` returns a `String`/`Array`
/// (dict-construction composites are registered by the `>>` operator
/// instead, once they actually exist).
pub fn register_scanned(ctx: &mut crate::context::Context, obj: &Object) {
    if let Some(ts) = obj.composite_timestamp() {
        let is_global = obj.is_global().unwrap_or(false);
        register_new(ctx, ts, is_global);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_of(s: &str) -> PFile {
        memory_reader(s.as_bytes().to_vec())
    }

    #[test]
    fn scans_integer_and_real() {
        let f = file_of("42 -3.5");
        assert!(matches!(next_object(&f, false).unwrap(), Some(Object::Integer(42))));
        assert!(matches!(next_object(&f, false).unwrap(), Some(Object::Real(r)) if (r + 3.5).abs() < 1e-9));
    }

    #[test]
    fn scans_literal_string_with_escapes() {
        let f = file_of("(hello\\nworld)");
        match next_object(&f, false).unwrap() {
            Some(Object::String(s)) => assert_eq!(s.to_utf8_lossy(), "hello\nworld"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn scans_nested_procedure() {
        let f = file_of("{ 1 2 add }");
        match next_object(&f, false).unwrap() {
            Some(Object::Array(a)) => assert_eq!(a.length, 3),
            other => panic!("expected procedure array, got {:?}", other),
        }
    }

    #[test]
    fn scans_radix_number() {
        let f = file_of("16#FF");
        assert!(matches!(next_object(&f, false).unwrap(), Some(Object::Integer(255))));
    }
}
