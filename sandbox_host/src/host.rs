//! # Sandbox Host
//!
//! One guest program, one engine, one lifetime.
//!
//! ```text
//!   Empty --load ok--> Loaded --memory/stack breach--> Poisoned
//!     |                  |                                |
//!     +--load failed--> Disposed <--------dispose---------+
//! ```
//!
//! Timeouts, guest errors and marshal failures keep the instance `Loaded`;
//! they come back as a [`FrameOutput`] carrying a diagnostic command.

use crate::environment::{self, Engine};
use crate::error::{FrameFault, HostError, LoadError, MarshalError};
use crate::instance::{Fingerprint, InstanceId};
use crate::interrupt::{self, Trip, TripCell};
use crate::marshal::{to_guest, to_plain};
use game_types::{decode_commands, Command, InputSnapshot, Metadata, RawManifest};
use lifecycle::{AbortReason, Clock, DeadlineCheck, SystemClock, Timeout};
use mlua::{ChunkMode, Function, RegistryKey, Table, Value};
use resources::{ManifestBudget, ResourceExceeded, SandboxLimits};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// Declarations produced by a successful load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedGame {
    pub metadata: Metadata,
    pub manifest: RawManifest,
}

/// Result of one `update` call that did not end the instance
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub commands: Vec<Command>,
    /// Set when `commands` is the one-element diagnostic list
    pub fault: Option<FrameFault>,
}

impl FrameOutput {
    fn ok(commands: Vec<Command>) -> Self {
        Self {
            commands,
            fault: None,
        }
    }

    fn faulted(fault: FrameFault) -> Self {
        Self {
            commands: vec![Command::diagnostic(fault.to_string())],
            fault: Some(fault),
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }
}

/// Externally visible lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Empty,
    Loaded,
    Poisoned,
    Disposed,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Empty => write!(f, "empty"),
            InstanceState::Loaded => write!(f, "loaded"),
            InstanceState::Poisoned => write!(f, "poisoned"),
            InstanceState::Disposed => write!(f, "disposed"),
        }
    }
}

struct Guest {
    update: RegistryKey,
    trip: TripCell,
    fingerprint: Fingerprint,
    engine: Engine,
}

enum HostState {
    Empty,
    Loaded(Box<Guest>),
    Poisoned(ResourceExceeded),
    Disposed,
}

/// How a guarded engine call ended when it did not simply succeed
enum Fault {
    Error(mlua::Error),
    Interrupted(AbortReason),
    Breach(ResourceExceeded),
}

enum UpdateFailure {
    Frame(FrameFault),
    Fatal(ResourceExceeded),
}

/// Isolated execution host for one guest program
pub struct SandboxHost {
    id: InstanceId,
    limits: SandboxLimits,
    budget: ManifestBudget,
    clock: Rc<dyn Clock>,
    state: HostState,
    armed: Rc<Cell<bool>>,
    update_calls: u64,
}

impl SandboxHost {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            id: InstanceId::new(),
            limits,
            budget: ManifestBudget::default(),
            clock: Rc::new(SystemClock),
            state: HostState::Empty,
            armed: Rc::new(Cell::new(false)),
            update_calls: 0,
        }
    }

    /// Builder: replaces the manifest budget checked at load
    pub fn with_budget(mut self, budget: ManifestBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Builder: replaces the clock used for call deadlines
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn state(&self) -> InstanceState {
        match self.state {
            HostState::Empty => InstanceState::Empty,
            HostState::Loaded(_) => InstanceState::Loaded,
            HostState::Poisoned(_) => InstanceState::Poisoned,
            HostState::Disposed => InstanceState::Disposed,
        }
    }

    /// True while an engine interrupt hook is installed
    pub fn interrupt_armed(&self) -> bool {
        self.armed.get()
    }

    /// Number of `update` calls actually issued to the guest
    pub fn update_calls(&self) -> u64 {
        self.update_calls
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match &self.state {
            HostState::Loaded(guest) => Some(guest.fingerprint),
            _ => None,
        }
    }

    /// Bytes currently allocated by the guest engine
    pub fn memory_used(&self) -> Option<usize> {
        match &self.state {
            HostState::Loaded(guest) => Some(guest.engine.lua.used_memory()),
            _ => None,
        }
    }

    /// Compiles the guest, checks its entry points and collects its declarations
    ///
    /// Any failure disposes the instance.
    pub fn load(&mut self, source: &str) -> Result<LoadedGame, LoadError> {
        match self.state {
            HostState::Empty => {}
            HostState::Disposed => return Err(LoadError::Disposed),
            HostState::Loaded(_) | HostState::Poisoned(_) => return Err(LoadError::AlreadyLoaded),
        }

        match self.try_load(source) {
            Ok((guest, game)) => {
                info!(
                    instance = %self.id,
                    fingerprint = %guest.fingerprint.short(),
                    title = %game.metadata.title,
                    images = game.manifest.images.len(),
                    sounds = game.manifest.sounds.len(),
                    "Game loaded"
                );
                self.state = HostState::Loaded(Box::new(guest));
                Ok(game)
            }
            Err(err) => {
                warn!(instance = %self.id, error = %err, "Game load failed");
                self.state = HostState::Disposed;
                Err(err)
            }
        }
    }

    fn try_load(&self, source: &str) -> Result<(Guest, LoadedGame), LoadError> {
        if source.len() > self.limits.max_source_bytes {
            return Err(LoadError::SourceTooLarge {
                size: source.len(),
                limit: self.limits.max_source_bytes,
            });
        }

        let fingerprint = Fingerprint::of(source);
        let trip: TripCell = Rc::new(RefCell::new(None));
        let engine = environment::create_engine(&self.limits, trip.clone(), self.id)
            .map_err(|e| LoadError::Engine(e.to_string()))?;
        let lua = &engine.lua;
        let load_timeout = Timeout::after(self.limits.load_timeout());

        let chunk = lua
            .load(source)
            .set_name("=game")
            .set_mode(ChunkMode::Text)
            .into_function()
            .map_err(|e| match e {
                mlua::Error::SyntaxError { message, .. } => LoadError::Syntax(message),
                other => LoadError::Evaluation(describe_error(&other)),
            })?;

        self.guarded(&engine, &trip, load_timeout, || chunk.call::<()>(()))
            .map_err(|fault| self.load_fault("game source", fault, LoadError::Evaluation))?;

        let globals = lua.globals();
        let metadata_fn = entry_point(&globals, "metadata")?;
        let resources_fn = entry_point(&globals, "resources")?;
        let update_fn = entry_point(&globals, "update")?;

        let metadata = self.declaration(&engine, &trip, load_timeout, "metadata", &metadata_fn)?;
        let metadata = Metadata::from_plain(metadata)?;

        let manifest = self.declaration(&engine, &trip, load_timeout, "resources", &resources_fn)?;
        let manifest = RawManifest::from_plain(manifest)?;
        self.budget
            .check_counts(manifest.images.len(), manifest.sounds.len())?;
        for (id, descriptor) in &manifest.images {
            let (w, h) = RawManifest::declared_size(descriptor);
            self.budget.check_image(id, w, h)?;
        }

        let update = lua
            .create_registry_value(update_fn)
            .map_err(|e| LoadError::Engine(e.to_string()))?;

        let guest = Guest {
            update,
            trip,
            fingerprint,
            engine,
        };
        Ok((guest, LoadedGame { metadata, manifest }))
    }

    /// Calls one declaration entry point and brings its result across
    fn declaration(
        &self,
        engine: &Engine,
        trip: &TripCell,
        timeout: Timeout,
        entry: &'static str,
        function: &Function,
    ) -> Result<serde_json::Value, LoadError> {
        let value = self
            .guarded(engine, trip, timeout, || function.call::<Value>(()))
            .map_err(|fault| {
                self.load_fault(entry, fault, |message| LoadError::EntryPointFailed {
                    entry,
                    message,
                })
            })?;
        to_plain(&format!("{entry}()"), value).map_err(|source| LoadError::Marshal { entry, source })
    }

    fn load_fault(
        &self,
        stage: &'static str,
        fault: Fault,
        on_error: impl FnOnce(String) -> LoadError,
    ) -> LoadError {
        match fault {
            Fault::Error(e) => on_error(describe_error(&e)),
            Fault::Interrupted(_) => LoadError::Timeout {
                stage,
                limit_ms: self.limits.load_timeout_ms,
            },
            Fault::Breach(breach) => LoadError::ResourceLimitExceeded(breach),
        }
    }

    /// Runs one guest frame
    ///
    /// Guest errors, timeouts and invalid return values produce an `Ok` output
    /// holding a single diagnostic command. A memory or stack breach poisons
    /// the instance and is returned as an error.
    pub fn call_update(&mut self, dt: f64, input: &InputSnapshot) -> Result<FrameOutput, HostError> {
        let guest = match &self.state {
            HostState::Loaded(guest) => guest,
            HostState::Empty => return Err(HostError::NotLoaded),
            HostState::Poisoned(breach) => return Err(HostError::InstancePoisoned(breach.clone())),
            HostState::Disposed => return Err(HostError::Disposed),
        };

        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            warn!(instance = %self.id, dt, "Invalid frame delta, using 0");
            0.0
        };

        let outcome = self.run_update(guest, dt, input);
        self.update_calls += 1;

        match outcome {
            Ok(commands) => Ok(FrameOutput::ok(commands)),
            Err(UpdateFailure::Frame(fault)) => {
                debug!(instance = %self.id, frame = self.update_calls, fault = %fault, "Frame faulted");
                Ok(FrameOutput::faulted(fault))
            }
            Err(UpdateFailure::Fatal(breach)) => {
                error!(instance = %self.id, frame = self.update_calls, breach = %breach, "Instance poisoned");
                self.state = HostState::Poisoned(breach.clone());
                Err(HostError::ResourceLimitExceeded(breach))
            }
        }
    }

    fn run_update(
        &self,
        guest: &Guest,
        dt: f64,
        input: &InputSnapshot,
    ) -> Result<Vec<Command>, UpdateFailure> {
        let engine_fault = |e: mlua::Error| UpdateFailure::Frame(FrameFault::Runtime(describe_error(&e)));
        let lua = &guest.engine.lua;
        let update: Function = lua.registry_value(&guest.update).map_err(engine_fault)?;
        let input = to_guest(lua, input)
            .map_err(|e| UpdateFailure::Frame(FrameFault::Marshal(e)))?;

        let timeout = Timeout::after(self.limits.call_timeout());
        let returned = self
            .guarded(&guest.engine, &guest.trip, timeout, || {
                update.call::<Value>((dt, input))
            })
            .map_err(|fault| match fault {
                Fault::Error(e) => UpdateFailure::Frame(FrameFault::Runtime(describe_error(&e))),
                Fault::Interrupted(reason) => {
                    UpdateFailure::Frame(FrameFault::Timeout(reason.to_string()))
                }
                Fault::Breach(breach) => UpdateFailure::Fatal(breach),
            })?;

        let plain = to_plain("update()", returned)
            .map_err(|e| UpdateFailure::Frame(FrameFault::Marshal(e)))?;
        decode_commands(plain, self.limits.max_commands_per_frame)
            .map_err(|e| UpdateFailure::Frame(FrameFault::Marshal(MarshalError::from(e))))
    }

    /// Runs `f` with the interrupt hook armed and classifies how it ended
    ///
    /// A breach is recognised from engine state only: the trip flag, a
    /// refused allocation, or a memory or stack error kind.
    fn guarded<T>(
        &self,
        engine: &Engine,
        trip: &TripCell,
        timeout: Timeout,
        f: impl FnOnce() -> mlua::Result<T>,
    ) -> Result<T, Fault> {
        engine.allocations.clear();
        let check = DeadlineCheck::start(self.clock.clone(), timeout);
        let armed = interrupt::arm(
            &engine.lua,
            Box::new(check),
            self.limits.max_call_depth(),
            self.limits.poll_interval,
            trip.clone(),
            self.armed.clone(),
        );
        let result = f();
        drop(armed);

        let mut tripped = trip.borrow_mut().take();
        if tripped.is_none() && result.is_err() && engine.allocations.take_refused() {
            tripped = Some(Trip::Memory);
        }
        match (tripped, result) {
            (Some(trip), _) => Err(self.trip_fault(trip)),
            (None, Ok(value)) => Ok(value),
            (None, Err(e)) => match interrupt::breach_in(&e) {
                Some(trip) => Err(self.trip_fault(trip)),
                None => Err(Fault::Error(e)),
            },
        }
    }

    fn trip_fault(&self, trip: Trip) -> Fault {
        match trip {
            Trip::Interrupted(reason) => Fault::Interrupted(reason),
            Trip::StackDepth { .. } => Fault::Breach(ResourceExceeded::Stack {
                limit: self.limits.stack,
            }),
            Trip::Memory => Fault::Breach(ResourceExceeded::Memory {
                limit: self.limits.memory,
            }),
        }
    }

    /// Releases the engine; safe to call any number of times from any state
    pub fn dispose(&mut self) {
        if matches!(self.state, HostState::Disposed) {
            return;
        }
        let previous = mem::replace(&mut self.state, HostState::Disposed);
        drop(previous);
        self.armed.set(false);
        debug!(instance = %self.id, "Instance disposed");
    }
}

impl Drop for SandboxHost {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for SandboxHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxHost")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("update_calls", &self.update_calls)
            .finish()
    }
}

fn entry_point(globals: &Table, name: &'static str) -> Result<Function, LoadError> {
    match globals.raw_get::<Value>(name) {
        Ok(Value::Function(function)) => Ok(function),
        _ => Err(LoadError::MissingEntryPoint(name)),
    }
}

/// First line of an engine error, without traceback
fn describe_error(err: &mlua::Error) -> String {
    let message = match err {
        mlua::Error::CallbackError { cause, .. } => return describe_error(cause),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    message.lines().next().unwrap_or_default().to_string()
}
