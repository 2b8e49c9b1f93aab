//! Engine-level interrupt wiring.
//!
//! The engine calls back every `poll_interval` VM instructions. Each poll
//! checks, in order: a previous trip (trips are sticky for the rest of the
//! call), the call-depth ceiling, and the injected [`InterruptCheck`]. The
//! hook is removed when the returned [`ArmedInterrupt`] is dropped, whatever
//! the outcome of the call.

use lifecycle::{AbortReason, InterruptCheck, InterruptDecision};
use mlua::{HookTriggers, Lua, VmState};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Why the current call was stopped by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Trip {
    Interrupted(AbortReason),
    StackDepth { max_depth: usize },
    Memory,
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trip::Interrupted(reason) => write!(f, "interrupted: {reason}"),
            Trip::StackDepth { max_depth } => {
                write!(f, "stack overflow (call depth above {max_depth})")
            }
            Trip::Memory => write!(f, "not enough memory"),
        }
    }
}

/// Trip state shared between the hook, the error guard and the host
pub(crate) type TripCell = Rc<RefCell<Option<Trip>>>;

/// Keeps the hook installed; removes it on drop
pub(crate) struct ArmedInterrupt<'lua> {
    lua: &'lua Lua,
    armed: Rc<Cell<bool>>,
}

impl Drop for ArmedInterrupt<'_> {
    fn drop(&mut self) {
        self.lua.remove_hook();
        self.armed.set(false);
    }
}

pub(crate) fn arm<'lua>(
    lua: &'lua Lua,
    check: Box<dyn InterruptCheck>,
    max_depth: usize,
    poll_interval: u32,
    trip: TripCell,
    armed: Rc<Cell<bool>>,
) -> ArmedInterrupt<'lua> {
    let check = RefCell::new(check);
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(poll_interval.max(1)),
        move |lua, _debug| {
            if let Some(previous) = trip.borrow().as_ref() {
                return Err(mlua::Error::RuntimeError(previous.to_string()));
            }
            let tripped = if lua.inspect_stack(max_depth).is_some() {
                Trip::StackDepth { max_depth }
            } else {
                match check.borrow_mut().poll() {
                    InterruptDecision::Continue => return Ok(VmState::Continue),
                    InterruptDecision::Abort(reason) => Trip::Interrupted(reason),
                }
            };
            let message = tripped.to_string();
            *trip.borrow_mut() = Some(tripped);
            Err(mlua::Error::RuntimeError(message))
        },
    );
    armed.set(true);
    ArmedInterrupt { lua, armed }
}

/// Classifies engine errors that indicate a memory or stack ceiling breach
///
/// Only the error kind counts. Runtime errors carry guest-controlled text
/// and are never read here; refused allocations are seen by the allocation
/// watch instead.
pub(crate) fn breach_in(err: &mlua::Error) -> Option<Trip> {
    match err {
        mlua::Error::MemoryError(_) => Some(Trip::Memory),
        mlua::Error::StackError => Some(Trip::StackDepth { max_depth: 0 }),
        mlua::Error::CallbackError { cause, .. } => breach_in(cause),
        _ => None,
    }
}
