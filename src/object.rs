//! The `Object` variant — the tagged representation of every PostScript
//! value (§3.1).
//!
//! Eighteen tags: five immutable value types (Integer, Real, Boolean, Null,
//! Mark), Name and Operator, seven composite types whose backing store is
//! shared and subject to save/restore (String, Array, PackedArray, Dict,
//! File, Save, GState), FontID, and three execution-stack-only markers (Loop,
//! Stopped, HardReturn).
//!
//! Composite variants factor their shared bookkeeping — VM origin, access
//! level, and creation timestamp — into [`CompositeHeader`] rather than
//! repeating it per variant (§9 "Deep inheritance / mixins": the tagged union
//! replaces inheritance, so the common fields become a shared record).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::fonts::FontId;
use crate::graphics_state::GraphicsState;

/// Monotonic clock used for composite-object creation timestamps (§3.1,
/// §3.4). A plain atomic counter rather than a wall-clock read: the only
/// contract readers depend on is "later objects compare greater", which a
/// counter gives for free and without the monotonicity caveats of
/// `Instant`/`SystemTime` across threads.
static NEXT_TIMESTAMP: AtomicU64 = AtomicU64::new(1);

pub fn next_timestamp() -> u64 {
    NEXT_TIMESTAMP.fetch_add(1, Ordering::Relaxed)
}

/// Executability attribute (§3.1, §9 glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Literal,
    Executable,
}

/// Access level carried by every composite and by names (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Unlimited,
    ReadOnly,
    ExecuteOnly,
    NoAccess,
}

impl Access {
    pub fn writable(self) -> bool {
        matches!(self, Access::Unlimited)
    }

    pub fn readable(self) -> bool {
        matches!(self, Access::Unlimited | Access::ReadOnly)
    }
}

/// Fields shared by every composite object (§3.1 "Composite-object
/// invariants", §3.4).
#[derive(Debug, Clone)]
pub struct CompositeHeader {
    /// Creation timestamp; doubles as the identity key into the per-VM
    /// reference map (§3.4) and the save/restore protected-set key (§4.3).
    pub timestamp: u64,
    /// Fixed at creation. Local composites must never be referenced from
    /// global VM (`invalidaccess`).
    pub is_global: bool,
    pub access: Access,
}

impl CompositeHeader {
    pub fn new(is_global: bool) -> Self {
        CompositeHeader { timestamp: next_timestamp(), is_global, access: Access::Unlimited }
    }
}

/// Shared backing store for String objects: VM-origin, offset, and the
/// mutable byte buffer it indexes into. `start`/`length` let `getinterval`
/// and substring-taking ops create a new header pointing at the same buffer
/// (§3.1 "composite, substring-shareable").
#[derive(Debug, Clone)]
pub struct PString {
    pub header: CompositeHeader,
    pub buffer: Rc<RefCell<Vec<u8>>>,
    pub start: usize,
    pub length: usize,
}

impl PString {
    pub fn new(bytes: Vec<u8>, is_global: bool) -> Self {
        let length = bytes.len();
        PString { header: CompositeHeader::new(is_global), buffer: Rc::new(RefCell::new(bytes)), start: 0, length }
    }

    pub fn slice(&self, start: usize, length: usize) -> Self {
        PString {
            header: CompositeHeader::new(self.header.is_global),
            buffer: Rc::clone(&self.buffer),
            start: self.start + start,
            length,
        }
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        self.buffer.borrow()[self.start..self.start + self.length].to_vec()
    }

    pub fn to_utf8_lossy(&self) -> String {
        String::from_utf8_lossy(&self.as_bytes()).into_owned()
    }
}

/// Shared backing store for Array / PackedArray (§3.1).
#[derive(Debug, Clone)]
pub struct PArray {
    pub header: CompositeHeader,
    pub backing: Rc<RefCell<Vec<Object>>>,
    pub start: usize,
    pub length: usize,
    pub attr: Attr,
}

impl PArray {
    pub fn new(items: Vec<Object>, is_global: bool) -> Self {
        let length = items.len();
        PArray {
            header: CompositeHeader::new(is_global),
            backing: Rc::new(RefCell::new(items)),
            start: 0,
            length,
            attr: Attr::Literal,
        }
    }

    pub fn slice(&self, start: usize, length: usize) -> Self {
        PArray {
            header: CompositeHeader::new(self.header.is_global),
            backing: Rc::clone(&self.backing),
            start: self.start + start,
            length,
            attr: self.attr,
        }
    }

    pub fn to_vec(&self) -> Vec<Object> {
        self.backing.borrow()[self.start..self.start + self.length].to_vec()
    }
}

/// Shared backing store for Dict (§3.1). Ordinary `HashMap` — the spec
/// explicitly permits iteration order to differ from insertion order.
#[derive(Debug, Clone)]
pub struct PDict {
    pub header: CompositeHeader,
    pub map: Rc<RefCell<HashMap<String, Object>>>,
    pub max_length: usize,
}

impl PDict {
    pub fn new(max_length: usize, is_global: bool) -> Self {
        PDict { header: CompositeHeader::new(is_global), map: Rc::new(RefCell::new(HashMap::new())), max_length }
    }

    pub fn get(&self, key: &str) -> Option<Object> {
        self.map.borrow().get(key).cloned()
    }
}

/// A tokenizable or writable stream (§3.1). `Real` distinguishes an OS file
/// handle from a synthetic in-memory stream (e.g. a string run through
/// `readstring`/`token`); both are driven through the same `Read`-ish
/// interface in `tokenizer.rs`.
#[derive(Debug)]
pub enum FileBacking {
    Real(RefCell<std::fs::File>),
    Memory(RefCell<std::io::Cursor<Vec<u8>>>),
    Stdin(RefCell<std::io::Stdin>),
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct PFile {
    pub header: CompositeHeader,
    pub inner: Rc<FileBacking>,
    pub mode: FileMode,
    pub is_real_file: bool,
    /// A single byte pushed back by the tokenizer (e.g. after peeking past a
    /// token's delimiter).
    pub putback: Rc<RefCell<Option<u8>>>,
}

/// An operator: a function pointer plus the identity name it was registered
/// under (used for diagnostics and for `$error /command`).
#[derive(Clone, Copy)]
pub struct OperatorObj {
    pub name: &'static str,
    pub func: crate::context::OperatorFn,
}

impl fmt::Debug for OperatorObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operator({})", self.name)
    }
}

/// A token returned by `save`, consumed by `restore` (§3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveHandle(pub u64);

/// The seven loop kinds share one header (§4.2).
#[derive(Debug, Clone)]
pub enum LoopKind {
    For { current: f64, step: f64, limit: f64 },
    Repeat { remaining: i64 },
    Loop,
    ForAll { items: Rc<Vec<Object>>, cursor: usize, per_call: usize },
    CShow { string: PString, cursor: usize },
    KShow { string: PString, cursor: usize },
    PathForAll { elements: Rc<Vec<crate::path::PathElement>>, cursor: usize },
    FilenameForAll { names: Rc<Vec<String>>, cursor: usize },
}

#[derive(Debug, Clone)]
pub struct LoopHeader {
    pub kind: LoopKind,
    pub proc: Object,
    /// Dictionary-stack depth to restore `font` to at each pass, resolving
    /// the open question in spec §9 about `kshow` font restoration: we save
    /// the font at loop-header construction time and reinstate it before
    /// every pass of the procedure.
    pub saved_font: Option<FontId>,
}

/// Every possible PostScript value (§3.1).
#[derive(Clone)]
pub enum Object {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Null,
    Mark,
    Name(Rc<str>, Attr),
    Operator(OperatorObj),
    String(PString),
    Array(PArray),
    PackedArray(PArray),
    Dict(PDict),
    File(PFile),
    Save(SaveHandle),
    GState(Rc<GraphicsState>),
    FontID(FontId),
    Loop(Box<LoopHeader>),
    Stopped,
    HardReturn,
}

impl Object {
    pub fn name(s: &str) -> Object {
        Object::Name(Rc::from(s), Attr::Executable)
    }

    pub fn literal_name(s: &str) -> Object {
        Object::Name(Rc::from(s), Attr::Literal)
    }

    pub fn string(s: &str) -> Object {
        Object::String(PString::new(s.as_bytes().to_vec(), false))
    }

    pub fn array(items: Vec<Object>) -> Object {
        Object::Array(PArray::new(items, false))
    }

    /// Procedures parse as a literal (non-executing) Array whose `attr` is
    /// `Executable` — `{ ... }` pushes itself as data until something `exec`s
    /// or dispatches it (§4.1 rule 5).
    pub fn procedure(items: Vec<Object>) -> Object {
        let mut arr = PArray::new(items, false);
        arr.attr = Attr::Executable;
        Object::Array(arr)
    }

    /// Whether the dispatch loop treats this object as data (push to operand
    /// stack) rather than something to execute, per §4.1 rule 1: immutable
    /// value types are always literal regardless of attribute; composites
    /// and Names follow their own `attr`/`Attr` field.
    pub fn is_literal(&self) -> bool {
        match self {
            Object::Integer(_)
            | Object::Real(_)
            | Object::Boolean(_)
            | Object::Null
            | Object::Mark
            | Object::String(_)
            | Object::Dict(_)
            | Object::File(_)
            | Object::Save(_)
            | Object::GState(_)
            | Object::FontID(_) => true,
            Object::Name(_, attr) => *attr == Attr::Literal,
            Object::Array(a) | Object::PackedArray(a) => a.attr == Attr::Literal,
            Object::Operator(_) => false,
            Object::Loop(_) | Object::Stopped | Object::HardReturn => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "integertype",
            Object::Real(_) => "realtype",
            Object::Boolean(_) => "booleantype",
            Object::Null => "nulltype",
            Object::Mark => "marktype",
            Object::Name(..) => "nametype",
            Object::Operator(_) => "operatortype",
            Object::String(_) => "stringtype",
            Object::Array(_) => "arraytype",
            Object::PackedArray(_) => "packedarraytype",
            Object::Dict(_) => "dicttype",
            Object::File(_) => "filetype",
            Object::Save(_) => "savetype",
            Object::GState(_) => "gstatetype",
            Object::FontID(_) => "fonttype",
            Object::Loop(_) => "looptype",
            Object::Stopped => "stoppedtype",
            Object::HardReturn => "hardreturntype",
        }
    }

    /// Numeric coercion shared by arithmetic and matrix operators.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    /// Identity timestamp for composites; `None` for value types that have
    /// no VM-bound identity.
    pub fn composite_timestamp(&self) -> Option<u64> {
        match self {
            Object::String(s) => Some(s.header.timestamp),
            Object::Array(a) | Object::PackedArray(a) => Some(a.header.timestamp),
            Object::Dict(d) => Some(d.header.timestamp),
            Object::File(f) => Some(f.header.timestamp),
            _ => None,
        }
    }

    pub fn is_global(&self) -> Option<bool> {
        match self {
            Object::String(s) => Some(s.header.is_global),
            Object::Array(a) | Object::PackedArray(a) => Some(a.header.is_global),
            Object::Dict(d) => Some(d.header.is_global),
            Object::File(f) => Some(f.header.is_global),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(i) => write!(f, "{}", i),
            Object::Real(r) => write!(f, "{}", r),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Null => write!(f, "null"),
            Object::Mark => write!(f, "--mark--"),
            Object::Name(n, Attr::Literal) => write!(f, "/{}", n),
            Object::Name(n, Attr::Executable) => write!(f, "{}", n),
            Object::Operator(o) => write!(f, "--{}--", o.name),
            Object::String(s) => write!(f, "({})", s.to_utf8_lossy()),
            Object::Array(a) | Object::PackedArray(a) => {
                write!(f, "[")?;
                for (i, v) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Object::Dict(_) => write!(f, "--nostringval--"),
            Object::File(_) => write!(f, "--filetype--"),
            Object::Save(s) => write!(f, "--save{}--", s.0),
            Object::GState(_) => write!(f, "--gstate--"),
            Object::FontID(id) => write!(f, "--font{}--", id.0),
            Object::Loop(_) => write!(f, "--loop--"),
            Object::Stopped => write!(f, "--stopped--"),
            Object::HardReturn => write!(f, "--hardreturn--"),
        }
    }
}
