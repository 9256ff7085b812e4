//! `Context` — the one object every operator and every piece of the engine
//! is handed: the four user-visible stacks, VM bookkeeping, the display
//! list, font and glyph-cache tables, `$error`, and system parameters (§2,
//! §4, §5). Operators are plain `fn(&mut Context) -> Result<(), PSError>`
//! values, registered under their PostScript name in the innermost
//! `systemdict`-equivalent dictionary at startup (§4.1 "Operator dispatch").

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::color::Color;
use crate::display_list::DisplayList;
use crate::error::PSError;
use crate::fonts::{FontId, FontTable};
use crate::glyph_cache::{BitmapCache, PathCache};
use crate::graphics_state::GraphicsState;
use crate::object::{Object, PDict, SaveHandle};
use crate::systemparams::SystemParams;
use crate::vm::Vm;

/// The signature every PostScript operator implements (§4.1).
pub type OperatorFn = fn(&mut Context) -> Result<(), PSError>;

/// VM allocation mode selected by `setglobal`/`currentglobal` (§5): which of
/// the two reference maps a freshly constructed composite registers into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmMode {
    Local,
    Global,
}

/// A ring buffer of recently dispatched operator/procedure names, exposed
/// through `$error /ostack`-adjacent diagnostics and consulted by
/// `install_error` (§7). `paused` is set while an error is being folded into
/// execution so a nested error during handler setup doesn't recurse.
#[derive(Debug, Default)]
pub struct History {
    ring: Vec<String>,
    capacity: usize,
    pub paused: bool,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History { ring: Vec::with_capacity(capacity), capacity, paused: false }
    }

    pub fn record(&mut self, name: &str) {
        if self.ring.len() == self.capacity {
            self.ring.remove(0);
        }
        self.ring.push(name.to_string());
    }

    pub fn recent(&self) -> &[String] {
        &self.ring
    }
}

impl Default for VmMode {
    fn default() -> Self {
        VmMode::Local
    }
}

/// The interpreter's full mutable state (§2 "Stacks", §3.4, §5).
pub struct Context {
    pub operand_stack: Vec<Object>,
    pub execution_stack: Vec<Object>,
    pub dict_stack: Vec<PDict>,
    pub gstate_stack: Vec<GraphicsState>,

    pub vm: Vm,
    pub vm_alloc_mode: VmMode,
    /// Outstanding `save` handles created by `execjob`/`startjob` job
    /// encapsulation, distinct from ordinary operator-level `save` (§5 "Job
    /// encapsulation"): a job's own top-level save is tracked here so
    /// `Vm::save`'s "am I the outermost save" check also accounts for
    /// encapsulation that hasn't gone through `vm.saves` yet.
    pub job_stack: Vec<SaveHandle>,

    pub display_list: DisplayList,
    pub error_dict: Rc<RefCell<HashMap<String, Object>>>,
    pub sysparams: SystemParams,
    pub history: History,

    pub fonts: FontTable,
    pub path_cache: PathCache,
    pub bitmap_cache: BitmapCache,
    pub current_font: Option<FontId>,
    pub current_color: Color,
    /// Set by `setcachedevice`/`setcharwidth` while a Type 3 `CharProc` is
    /// running; consumed by `show`-family operators once the procedure
    /// returns (§4.6).
    pub pending_cache_device: Option<crate::fonts::type3::CacheDevice>,

    /// Invoked roughly every 10,000 dispatch-loop iterations (§4.1 "Event
    /// loop callback") so an embedding host can service its own I/O without
    /// the interpreter blocking indefinitely inside a tight PostScript loop.
    pub event_loop_callback: Option<Box<dyn FnMut(&mut Context)>>,
    pub iteration_count: u64,

    pub exit_code: i32,
    pub quit_requested: bool,
    /// Set by `stop`, consumed by the nearest enclosing `stopped`'s wait loop
    /// (§4.2 "stop"/"stopped").
    pub stop_requested: bool,
}

impl Context {
    pub fn new() -> Self {
        let mut ctx = Context {
            operand_stack: Vec::new(),
            execution_stack: Vec::new(),
            dict_stack: Vec::new(),
            gstate_stack: vec![GraphicsState::new(0)],
            vm: Vm::new(),
            vm_alloc_mode: VmMode::Local,
            job_stack: Vec::new(),
            display_list: DisplayList::default(),
            error_dict: Rc::new(RefCell::new(HashMap::new())),
            sysparams: SystemParams::default(),
            history: History::new(64),
            fonts: FontTable::default(),
            path_cache: PathCache::default(),
            bitmap_cache: BitmapCache::default(),
            current_font: None,
            current_color: Color::black(),
            pending_cache_device: None,
            event_loop_callback: None,
            iteration_count: 0,
            exit_code: 0,
            quit_requested: false,
            stop_requested: false,
        };
        // operators::install pushes the systemdict/userdict baseline; a
        // fresh Context carries no dictionaries of its own until then.
        ctx
    }

    pub fn gstate(&self) -> &GraphicsState {
        self.gstate_stack.last().expect("gstate stack is never empty")
    }

    pub fn gstate_mut(&mut self) -> &mut GraphicsState {
        self.gstate_stack.last_mut().expect("gstate stack is never empty")
    }

    /// Records a dispatched name in the execution history ring buffer
    /// (§4.1), skipped while an error is being folded into execution to
    /// avoid polluting the trail with handler bookkeeping.
    pub fn note_dispatch(&mut self, name: &str) {
        if !self.history.paused {
            self.history.record(name);
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}
