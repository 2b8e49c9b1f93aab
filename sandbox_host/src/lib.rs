//! # Sandbox Host
//!
//! This crate runs one untrusted guest game inside an embedded Lua engine
//! under hard memory, stack and time ceilings.
//!
//! ## Philosophy
//!
//! - **The host never falls over**: Every guest failure is a value, either an
//!   in-band diagnostic frame or an error that ends only this instance
//! - **Nothing live crosses the boundary**: Guests exchange plain data with
//!   the host; no functions, handles or cycles in either direction
//! - **Bounded by construction**: Each call runs with an armed interrupt that
//!   is always removed when the call returns
//! - **Testable time**: The deadline check takes an injected clock, so slow
//!   polling can be simulated without sleeping
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A general scripting platform (three entry points, one input shape)
//! - A way to interrupt a call from another thread (calls are synchronous
//!   and bounded by their own deadline)
//! - Persistent (an instance lives for one play session)

mod allocation;
mod environment;
pub mod error;
pub mod host;
pub mod instance;
mod interrupt;
pub mod marshal;

pub use error::{FrameFault, HostError, LoadError, MarshalError};
pub use host::{FrameOutput, InstanceState, LoadedGame, SandboxHost};
pub use instance::{Fingerprint, InstanceId};
pub use marshal::{to_guest, to_plain, PlainEncoder};
