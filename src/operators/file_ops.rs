//! File I/O, the `token` scanner entry point, and the diagnostic print
//! operators (§3.1 "File", §4.1 "Scanning").

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write as _;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::{CompositeHeader, FileBacking, FileMode, Object, PFile, PString};
use crate::tokenizer;

use super::def;

pub fn register(dict: &mut HashMap<String, Object>) {
    def(dict, "file", file);
    def(dict, "closefile", closefile);
    def(dict, "read", read);
    def(dict, "write", write_op);
    def(dict, "token", token);
    def(dict, "print", print);
    def(dict, "=", eq_print);
    def(dict, "==", eqeq_print);
    def(dict, "stack", stack);
    def(dict, "pstack", pstack);
}

fn pop(ctx: &mut Context, cmd: &str) -> Result<Object, PSError> {
    ctx.operand_stack.pop().ok_or_else(|| err(ErrorKind::StackUnderflow, cmd, "empty operand stack"))
}

fn pop_string(ctx: &mut Context, cmd: &str) -> Result<Vec<u8>, PSError> {
    match pop(ctx, cmd)? {
        Object::String(s) => Ok(s.as_bytes()),
        _ => Err(err(ErrorKind::TypeCheck, cmd, "expected a string")),
    }
}

/// `filename access file fileobj` (§3.1 "File"): opens a real filesystem
/// file, except for the three standard-file names, which bind to the
/// process-wide stdio proxies (§5 "Global mutable state").
pub fn file(ctx: &mut Context) -> Result<(), PSError> {
    let access = String::from_utf8_lossy(&pop_string(ctx, "file")?).into_owned();
    let name = String::from_utf8_lossy(&pop_string(ctx, "file")?).into_owned();
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);

    let (inner, mode, is_real_file) = match name.as_str() {
        "%stdout" => (FileBacking::Stdout, FileMode::Write, false),
        "%stderr" => (FileBacking::Stderr, FileMode::Write, false),
        "%stdin" => (FileBacking::Stdin(RefCell::new(std::io::stdin())), FileMode::Read, false),
        _ => {
            let mode = if access.starts_with('w') || access.starts_with('a') { FileMode::Write } else { FileMode::Read };
            let mut opts = std::fs::OpenOptions::new();
            match access.chars().next() {
                Some('w') => {
                    opts.write(true).create(true).truncate(true);
                }
                Some('a') => {
                    opts.write(true).create(true).append(true);
                }
                _ => {
                    opts.read(true);
                }
            }
            let f = opts.open(&name).map_err(|e| err(ErrorKind::UndefinedFilename, "file", format!("{}: {}", name, e)))?;
            (FileBacking::Real(RefCell::new(f)), mode, true)
        }
    };

    let pfile = PFile { header: CompositeHeader::new(is_global), inner: Rc::new(inner), mode, is_real_file, putback: Rc::new(RefCell::new(None)) };
    crate::vm::register_new(ctx, pfile.header.timestamp, is_global);
    ctx.operand_stack.push(Object::File(pfile));
    Ok(())
}

pub fn closefile(ctx: &mut Context) -> Result<(), PSError> {
    match pop(ctx, "closefile")? {
        Object::File(_) => Ok(()),
        _ => Err(err(ErrorKind::TypeCheck, "closefile", "expected a file")),
    }
}

/// `file read byte true` / `file read false` (§3.1): one byte, or `false` on
/// end of stream.
pub fn read(ctx: &mut Context) -> Result<(), PSError> {
    let Object::File(f) = pop(ctx, "read")? else { return Err(err(ErrorKind::TypeCheck, "read", "expected a file")) };
    match tokenizer::read_one_byte(&f) {
        Some(b) => {
            ctx.operand_stack.push(Object::Integer(b as i64));
            ctx.operand_stack.push(Object::Boolean(true));
        }
        None => ctx.operand_stack.push(Object::Boolean(false)),
    }
    Ok(())
}

/// `file byte write -` (§3.1): writes a single byte to the stream.
pub fn write_op(ctx: &mut Context) -> Result<(), PSError> {
    let byte = pop(ctx, "write")?.as_i64().ok_or_else(|| err(ErrorKind::TypeCheck, "write", "expected an integer"))?;
    if !(0..=255).contains(&byte) {
        return Err(err(ErrorKind::RangeCheck, "write", "byte out of range"));
    }
    let Object::File(f) = pop(ctx, "write")? else { return Err(err(ErrorKind::TypeCheck, "write", "expected a file")) };
    write_bytes(&f, &[byte as u8]).map_err(|e| err(ErrorKind::IOError, "write", e.to_string()))
}

fn write_bytes(f: &PFile, bytes: &[u8]) -> std::io::Result<()> {
    match &*f.inner {
        FileBacking::Real(file) => file.borrow_mut().write_all(bytes),
        FileBacking::Memory(c) => c.borrow_mut().write_all(bytes),
        FileBacking::Stdout => std::io::stdout().write_all(bytes),
        FileBacking::Stderr => std::io::stderr().write_all(bytes),
        FileBacking::Stdin(_) => Err(std::io::Error::new(std::io::ErrorKind::Other, "stdin is not writable")),
    }
}

/// `file token any true` / `file token false` and the string-operand overload
/// (`string token any substring true` / `string token false`) (§4.1
/// "Scanning").
pub fn token(ctx: &mut Context) -> Result<(), PSError> {
    let is_global = matches!(ctx.vm_alloc_mode, crate::context::VmMode::Global);
    match pop(ctx, "token")? {
        Object::File(f) => match tokenizer::next_object(&f, is_global)? {
            Some(obj) => {
                tokenizer::register_scanned(ctx, &obj);
                ctx.operand_stack.push(obj);
                ctx.operand_stack.push(Object::Boolean(true));
            }
            None => ctx.operand_stack.push(Object::Boolean(false)),
        },
        Object::String(s) => {
            let bytes = s.as_bytes();
            let reader = tokenizer::memory_reader(bytes.clone());
            match tokenizer::next_object(&reader, is_global)? {
                Some(obj) => {
                    tokenizer::register_scanned(ctx, &obj);
                    let consumed = tokenizer::memory_reader_position(&reader);
                    let rest = PString { header: CompositeHeader::new(s.header.is_global), buffer: Rc::new(RefCell::new(bytes[consumed..].to_vec())), start: 0, length: bytes.len() - consumed };
                    ctx.operand_stack.push(obj);
                    ctx.operand_stack.push(Object::String(rest));
                    ctx.operand_stack.push(Object::Boolean(true));
                }
                None => ctx.operand_stack.push(Object::Boolean(false)),
            }
        }
        _ => return Err(err(ErrorKind::TypeCheck, "token", "expected a file or string")),
    }
    Ok(())
}

/// `any print -` (§4.1): writes the operand's textual form with no
/// terminator to standard output.
pub fn print(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "print")?;
    print!("{}", v);
    Ok(())
}

pub fn eq_print(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "=")?;
    println!("{}", v);
    Ok(())
}

pub fn eqeq_print(ctx: &mut Context) -> Result<(), PSError> {
    let v = pop(ctx, "==")?;
    println!("{}", v);
    Ok(())
}

/// `stack -` (§4.1): prints the operand stack top-to-bottom, nondestructively.
pub fn stack(ctx: &mut Context) -> Result<(), PSError> {
    for v in ctx.operand_stack.iter().rev() {
        println!("{}", v);
    }
    Ok(())
}

pub fn pstack(ctx: &mut Context) -> Result<(), PSError> {
    stack(ctx)
}
