//! Virtual memory and save/restore (§3.4, §3.5, §4.3).
//!
//! Two key-value "reference maps" (local, per-[`crate::context::Context`];
//! global, process-wide) record which composites exist and in which VM.
//! `save` is O(1): it just pushes a [`SaveRecord`] with an empty protected
//! set. `restore` is O(k) in the number of composites actually mutated since
//! that save, thanks to the copy-on-write protocol in [`cow_check`]: a
//! composite's backing store is cloned into the save's protected set only on
//! its *first* mutation after the save, and restore writes that frozen
//! snapshot back in place through the very `Rc<RefCell<_>>` every live alias
//! of the object shares — so there is no separate "reachability arena" to
//! keep in sync, aliasing (`dup`, `copy`, dict sharing) just works.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::context::Context;
use crate::error::{err, ErrorKind, PSError};
use crate::object::{Object, PArray, PDict, PString, SaveHandle};

/// Frozen pre-mutation snapshot of a composite backing store, captured the
/// first time it is mutated after a given save. Holds an `Rc` clone of the
/// *same* backing cell every alias of the object shares, so restoring writes
/// through to all of them.
enum Protected {
    Str(Rc<RefCell<Vec<u8>>>, Vec<u8>),
    Arr(Rc<RefCell<Vec<Object>>>, Vec<Object>),
    Dict(Rc<RefCell<HashMap<String, Object>>>, HashMap<String, Object>),
}

/// §3.5. One entry per outstanding `save`.
pub struct SaveRecord {
    pub id: u64,
    protected: HashMap<u64, Protected>,
    /// Global-VM protected set, populated only for the job's outermost save.
    global_protected: Option<HashMap<u64, Protected>>,
    /// Graphics-state stack depth at save time; restore pops/rolls back to
    /// this depth (an implicit `grestoreall`).
    pub gstate_depth: usize,
    pub is_outermost: bool,
}

/// Per-`Context` local VM bookkeeping plus the save stack.
pub struct Vm {
    local_refs: HashSet<u64>,
    saves: Vec<SaveRecord>,
}

impl Vm {
    pub fn new() -> Self {
        Vm { local_refs: HashSet::new(), saves: Vec::new() }
    }

    pub fn register_local(&mut self, timestamp: u64) {
        self.local_refs.insert(timestamp);
    }

    pub fn save_depth(&self) -> usize {
        self.saves.len()
    }

    pub fn top_save_id(&self) -> Option<u64> {
        self.saves.last().map(|s| s.id)
    }

    /// Graphics-state stack depth recorded by the most recent outstanding
    /// `save`, used by `grestoreall` (§4.4 "grestoreall").
    pub fn top_save_gstate_depth(&self) -> Option<usize> {
        self.saves.last().map(|s| s.gstate_depth)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    /// Process-wide global VM (§3.4, §5). A real multi-context, multi-thread
    /// host would replace this `thread_local!` with an `Arc<Mutex<_>>` and
    /// take out the reader/writer lock the spec calls for around global
    /// composite registration and global-file lookup; `Object` holds `Rc`,
    /// not `Arc`, so that upgrade also means switching composites' backing
    /// stores to `Arc<RwLock<_>>`. Out of scope for a single-threaded core.
    static GLOBAL_REFS: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
    /// The append-only global string pool (§5 "Shared resources").
    static GLOBAL_STRING_POOL: RefCell<Vec<u8>> = RefCell::new(Vec::new());
}

pub fn register_global(timestamp: u64) {
    GLOBAL_REFS.with(|r| r.borrow_mut().insert(timestamp));
}

pub fn global_string_pool_append(bytes: &[u8]) -> usize {
    GLOBAL_STRING_POOL.with(|p| {
        let mut p = p.borrow_mut();
        let offset = p.len();
        p.extend_from_slice(bytes);
        offset
    })
}

/// Registers a freshly constructed composite in the VM selected by
/// `ctx.vm_alloc_mode` (§5 "VM allocation mode").
pub fn register_new(ctx: &mut Context, timestamp: u64, is_global: bool) {
    if is_global {
        register_global(timestamp);
    } else {
        ctx.vm.register_local(timestamp);
    }
}

/// `save` (§3.5): O(1), pushes an empty protected set.
pub fn save(ctx: &mut Context) -> SaveHandle {
    static NEXT_SAVE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
    let id = NEXT_SAVE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let is_outermost = ctx.vm.saves.is_empty() && ctx.job_stack.is_empty();
    let record = SaveRecord {
        id,
        protected: HashMap::new(),
        global_protected: if is_outermost { Some(HashMap::new()) } else { None },
        gstate_depth: ctx.gstate_stack.len(),
        is_outermost,
    };
    ctx.vm.saves.push(record);
    SaveHandle(id)
}

/// `restore` (§3.5, §4.3). Fails with `invalidrestore` if a composite newer
/// than `handle` is still reachable from the live stacks (it would be
/// orphaned by reverting VM state out from under it).
pub fn restore(ctx: &mut Context, handle: SaveHandle) -> Result<(), PSError> {
    let pos = ctx
        .vm
        .saves
        .iter()
        .position(|s| s.id == handle.0)
        .ok_or_else(|| err(ErrorKind::InvalidRestore, "restore", "save object not on the active save stack"))?;

    // Everything saved more recently than `handle` must be discarded first;
    // restoring a non-topmost save implicitly restores (and discards) every
    // save nested inside it.
    if reachable_timestamp_at_or_after(ctx, handle.0) {
        return Err(err(ErrorKind::InvalidRestore, "restore", "a newer composite object is still reachable"));
    }

    // Pop and apply every save from the top down to (and including) `pos`.
    while ctx.vm.saves.len() > pos {
        let record = ctx.vm.saves.pop().unwrap();
        for (_, protected) in record.protected {
            apply_protected(&protected);
        }
        if let Some(global_protected) = record.global_protected {
            for (_, protected) in global_protected {
                apply_protected(&protected);
            }
        }
        // grestoreall to the depth recorded at save time.
        while ctx.gstate_stack.len() > record.gstate_depth {
            ctx.gstate_stack.pop();
        }
    }
    Ok(())
}

fn apply_protected(p: &Protected) {
    match p {
        Protected::Str(rc, snapshot) => *rc.borrow_mut() = snapshot.clone(),
        Protected::Arr(rc, snapshot) => *rc.borrow_mut() = snapshot.clone(),
        Protected::Dict(rc, snapshot) => *rc.borrow_mut() = snapshot.clone(),
    }
}

/// Walks the stacks the spec names (operand, execution, dictionary) for any
/// composite whose timestamp is `>= floor` — a shallow scan (one level into
/// arrays/dicts is not followed) matching the "determined by walking the
/// stacks" reachability rule of §9 without a full tracing GC.
fn reachable_timestamp_at_or_after(ctx: &Context, floor: u64) -> bool {
    let newer = |o: &Object| o.composite_timestamp().is_some_and(|t| t >= floor);
    ctx.operand_stack.iter().any(newer)
        || ctx.execution_stack.iter().any(newer)
        || ctx.dict_stack.iter().any(|d| d.header.timestamp >= floor)
        || ctx.gstate_stack.iter().any(|g| g.page_device.as_ref().is_some_and(|d| d.header.timestamp >= floor))
}

fn topmost_save_id(ctx: &Context) -> Option<u64> {
    ctx.vm.saves.last().map(|s| s.id)
}

/// The copy-on-write check every mutating string operator must call before
/// touching the backing store (§4.3 "Copy-on-Write protocol").
pub fn cow_check_string(ctx: &mut Context, s: &PString) {
    let Some(save_id) = topmost_save_id(ctx) else { return };
    if s.header.timestamp >= save_id {
        return;
    }
    let saves = &mut ctx.vm.saves;
    let Some(record) = saves.last_mut() else { return };
    let set = if s.header.is_global { record.global_protected.as_mut() } else { Some(&mut record.protected) };
    let Some(set) = set else { return };
    set.entry(s.header.timestamp).or_insert_with(|| {
        let snapshot = s.buffer.borrow().clone();
        Protected::Str(Rc::clone(&s.buffer), snapshot)
    });
}

pub fn cow_check_array(ctx: &mut Context, a: &PArray) {
    let Some(save_id) = topmost_save_id(ctx) else { return };
    if a.header.timestamp >= save_id {
        return;
    }
    let saves = &mut ctx.vm.saves;
    let Some(record) = saves.last_mut() else { return };
    let set = if a.header.is_global { record.global_protected.as_mut() } else { Some(&mut record.protected) };
    let Some(set) = set else { return };
    set.entry(a.header.timestamp).or_insert_with(|| {
        let snapshot = a.backing.borrow().clone();
        Protected::Arr(Rc::clone(&a.backing), snapshot)
    });
}

pub fn cow_check_dict(ctx: &mut Context, d: &PDict) {
    let Some(save_id) = topmost_save_id(ctx) else { return };
    if d.header.timestamp >= save_id {
        return;
    }
    let saves = &mut ctx.vm.saves;
    let Some(record) = saves.last_mut() else { return };
    let set = if d.header.is_global { record.global_protected.as_mut() } else { Some(&mut record.protected) };
    let Some(set) = set else { return };
    set.entry(d.header.timestamp).or_insert_with(|| {
        let snapshot = d.map.borrow().clone();
        Protected::Dict(Rc::clone(&d.map), snapshot)
    });
}

/// `invalidaccess` guard (§3.1): a local composite must never become
/// reachable from global VM.
pub fn check_store_access(container_is_global: bool, value: &Object) -> Result<(), PSError> {
    if container_is_global {
        if let Some(false) = value.is_global() {
            return Err(err(
                ErrorKind::InvalidAccess,
                "put",
                "cannot store a local VM composite into a global VM composite",
            ));
        }
    }
    Ok(())
}
