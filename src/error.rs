//! The fixed PostScript error taxonomy and the `error()` reporting helper.
//!
//! Operators never `panic!` or early-return a bare `Err` to the caller in the
//! way a typical Rust library would; instead they call [`error`], which folds
//! error handling into ordinary execution per the PostScript model (populate
//! `$error`, push the handler name onto the execution stack, return to the
//! dispatch loop). [`PSError`] is still a normal `std::error::Error` so the
//! thin CLI boundary can use `anyhow` on top of it without re-inventing
//! display formatting.

use thiserror::Error;

use crate::context::Context;
use crate::object::Object;

/// The fixed set of PostScript error kinds (§7 of the spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    VMError,
    DictFull,
    DictStackOverflow,
    DictStackUnderflow,
    ExecStackOverflow,
    InvalidAccess,
    InvalidExit,
    InvalidFileAccess,
    InvalidFont,
    InvalidRestore,
    IOError,
    LimitCheck,
    NoCurrentPoint,
    RangeCheck,
    StackOverflow,
    StackUnderflow,
    SyntaxError,
    Timeout,
    TypeCheck,
    Undefined,
    UndefinedFilename,
    UndefinedResource,
    UndefinedResult,
    UnmatchedMark,
    Unregistered,
    Unsupported,
    ConfigurationError,
}

impl ErrorKind {
    /// The PostScript name of this error, as it appears in `errordict` and in
    /// `$error /errorname`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::VMError => "VMerror",
            ErrorKind::DictFull => "dictfull",
            ErrorKind::DictStackOverflow => "dictstackoverflow",
            ErrorKind::DictStackUnderflow => "dictstackunderflow",
            ErrorKind::ExecStackOverflow => "execstackoverflow",
            ErrorKind::InvalidAccess => "invalidaccess",
            ErrorKind::InvalidExit => "invalidexit",
            ErrorKind::InvalidFileAccess => "invalidfileaccess",
            ErrorKind::InvalidFont => "invalidfont",
            ErrorKind::InvalidRestore => "invalidrestore",
            ErrorKind::IOError => "ioerror",
            ErrorKind::LimitCheck => "limitcheck",
            ErrorKind::NoCurrentPoint => "nocurrentpoint",
            ErrorKind::RangeCheck => "rangecheck",
            ErrorKind::StackOverflow => "stackoverflow",
            ErrorKind::StackUnderflow => "stackunderflow",
            ErrorKind::SyntaxError => "syntaxerror",
            ErrorKind::Timeout => "timeout",
            ErrorKind::TypeCheck => "typecheck",
            ErrorKind::Undefined => "undefined",
            ErrorKind::UndefinedFilename => "undefinedfilename",
            ErrorKind::UndefinedResource => "undefinedresource",
            ErrorKind::UndefinedResult => "undefinedresult",
            ErrorKind::UnmatchedMark => "unmatchedmark",
            ErrorKind::Unregistered => "unregistered",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::ConfigurationError => "configurationerror",
        }
    }
}

/// A PostScript-level error: the kind, the operator that raised it (if any),
/// and a human-readable message for diagnostics/logging.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}", kind = self.kind.name())]
pub struct PSError {
    pub kind: ErrorKind,
    pub command: Option<String>,
    pub message: String,
}

impl PSError {
    pub fn new(kind: ErrorKind, command: impl Into<Option<String>>, message: impl Into<String>) -> Self {
        PSError { kind, command: command.into(), message: message.into() }
    }
}

/// Shorthand constructors used pervasively by operators, e.g.
/// `return Err(err(ErrorKind::StackUnderflow, "add", "operand stack too shallow"))`.
pub fn err(kind: ErrorKind, command: &str, message: impl Into<String>) -> PSError {
    PSError::new(kind, Some(command.to_string()), message)
}

/// The central error-reporting helper (§7 "Propagation policy").
///
/// Rather than unwind a Rust call stack, this installs `$error` in the
/// innermost dictionary and arranges for `errordict`'s handler to run on the
/// *next* iteration of the dispatch loop. Operators still return `PSError`
/// values up through `?` for convenience in Rust, but the top-level dispatch
/// loop (`engine::Engine::run`) is the only caller of this function — it
/// converts a returned `PSError` into the folded-into-execution form described
/// here before continuing.
pub fn install_error(ctx: &mut Context, e: &PSError) {
    ctx.history.paused = true;
    tracing::warn!(kind = e.kind.name(), command = ?e.command, message = %e.message, "postscript error");

    let error_dict = ctx.error_dict.clone();
    {
        let mut d = error_dict.borrow_mut();
        d.insert("errorname".to_string(), Object::name(e.kind.name()));
        d.insert(
            "command".to_string(),
            match &e.command {
                Some(c) => Object::name(c),
                None => Object::Null,
            },
        );
        d.insert("newerror".to_string(), Object::Boolean(true));
        d.insert("ostack_depth".to_string(), Object::Integer(ctx.operand_stack.len() as i64));
        d.insert("estack_depth".to_string(), Object::Integer(ctx.execution_stack.len() as i64));
    }

    ctx.execution_stack.push(Object::name("handleerror"));
    ctx.history.paused = false;
}

/// The default `errordict /handleerror` procedure (§7, PLRM §3.7.7): prints
/// the `$error` diagnostics to stderr, then behaves like `stop` — unwinding
/// to the nearest enclosing `Stopped` sentinel (`execjob` wraps every job in
/// one) or, failing that, aborting the job outright. A host that wants
/// interactive recovery instead replaces this dictionary entry with its own.
pub fn handleerror(ctx: &mut Context) -> Result<(), PSError> {
    let d = ctx.error_dict.borrow();
    let errorname = d.get("errorname").map(|o| o.to_string()).unwrap_or_else(|| "unknown".to_string());
    let command = d.get("command").map(|o| o.to_string()).unwrap_or_else(|| "--".to_string());
    let ostack_depth = d.get("ostack_depth").and_then(|o| o.as_i64()).unwrap_or(0);
    let estack_depth = d.get("estack_depth").and_then(|o| o.as_i64()).unwrap_or(0);
    drop(d);
    eprintln!("%%[ Error: {}; OffendingCommand: {} ]%%", errorname, command);
    eprintln!("%%[ ostack depth {}; estack depth {} ]%%", ostack_depth, estack_depth);
    ctx.error_dict.borrow_mut().insert("newerror".to_string(), Object::Boolean(false));

    if let Some(pos) = ctx.execution_stack.iter().rposition(|o| matches!(o, Object::Stopped)) {
        ctx.execution_stack.truncate(pos + 1);
        ctx.stop_requested = true;
    } else {
        ctx.execution_stack.clear();
        ctx.quit_requested = true;
    }
    Ok(())
}
