//! Allocation watch.
//!
//! The engine reports a refused allocation in two shapes: a memory-error
//! status from the core, or an ordinary runtime error from the auxiliary
//! buffer code. Both carry text a guest can raise itself. The watch sits in
//! front of the engine allocator and records refusals where they happen, so
//! a memory breach is recognised by what the allocator did and never by what
//! an error message says.

use mlua::{ffi, Lua};
use std::cell::Cell;
use std::os::raw::c_void;
use std::ptr;
use std::rc::Rc;
use tracing::warn;

/// One allocator request, identified the way the engine repeats it on retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Request {
    block: usize,
    old_size: usize,
    new_size: usize,
}

/// Last refused request not yet followed by a successful retry
pub(crate) type RefusalCell = Rc<Cell<Option<Request>>>;

/// Allocator userdata while the watch is installed
struct Forward {
    inner: ffi::lua_Alloc,
    inner_ud: *mut c_void,
    refusal: RefusalCell,
}

/// Forwards to the engine allocator and records what it refuses
///
/// The core retries a refused request once after an emergency collection;
/// a successful retry of the same request clears the record.
unsafe extern "C-unwind" fn watched(
    ud: *mut c_void,
    block: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    // SAFETY: `ud` is the `Forward` installed by `AllocationWatch::install`,
    // which stays alive until the original allocator is restored.
    let forward = unsafe { &*(ud as *const Forward) };
    // SAFETY: same arguments the engine passed us, same userdata the inner
    // allocator was installed with.
    let out = unsafe { (forward.inner)(forward.inner_ud, block, old_size, new_size) };

    let request = Request {
        block: block as usize,
        old_size,
        new_size,
    };
    if out.is_null() && new_size > 0 {
        forward.refusal.set(Some(request));
    } else if forward.refusal.get() == Some(request) {
        forward.refusal.set(None);
    }
    out
}

/// Installed allocator wrapper; restores the engine allocator on drop
pub(crate) struct AllocationWatch {
    lua: Lua,
    forward: *mut Forward,
    refusal: RefusalCell,
}

impl AllocationWatch {
    /// Wraps the current allocator of `lua`
    ///
    /// Set the memory limit first: the engine only exposes limit control
    /// while its own allocator is installed.
    pub(crate) fn install(lua: &Lua) -> mlua::Result<Self> {
        let refusal: RefusalCell = Rc::new(Cell::new(None));
        let mut forward: *mut Forward = ptr::null_mut();

        // SAFETY: the closure only swaps the allocator of a live state, and
        // the new userdata is leaked into a raw pointer owned by the watch.
        let installed = unsafe {
            lua.exec_raw::<()>((), |state| {
                let mut inner_ud = ptr::null_mut();
                let inner = ffi::lua_getallocf(state, &mut inner_ud);
                forward = Box::into_raw(Box::new(Forward {
                    inner,
                    inner_ud,
                    refusal: refusal.clone(),
                }));
                ffi::lua_setallocf(state, watched, forward.cast());
            })
        };

        if forward.is_null() {
            installed?;
            return Err(mlua::Error::RuntimeError(
                "allocator watch was not installed".to_string(),
            ));
        }
        let watch = Self {
            lua: lua.clone(),
            forward,
            refusal,
        };
        installed.map(|()| watch)
    }

    /// Shared record, for the guest-side error guard
    pub(crate) fn refusal(&self) -> RefusalCell {
        self.refusal.clone()
    }

    /// Forgets refusals from before the next call
    pub(crate) fn clear(&self) {
        self.refusal.set(None);
    }

    /// True once if an allocation was refused since the last check
    pub(crate) fn take_refused(&self) -> bool {
        self.refusal.take().is_some()
    }
}

impl Drop for AllocationWatch {
    fn drop(&mut self) {
        let forward = self.forward;
        // SAFETY: `forward` is still the installed userdata; putting the
        // original allocator back makes every later call bypass it.
        let restored = unsafe {
            self.lua.exec_raw::<()>((), |state| {
                let forward = &*forward;
                ffi::lua_setallocf(state, forward.inner, forward.inner_ud);
            })
        };
        match restored {
            // SAFETY: no longer reachable from the engine.
            Ok(()) => drop(unsafe { Box::from_raw(forward) }),
            // the engine may still call through it; keep it alive
            Err(err) => warn!(error = %err, "Engine allocator not restored"),
        }
    }
}
