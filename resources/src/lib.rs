//! # Resources
//!
//! Resource limit primitives for the game host.
//!
//! ## Philosophy
//!
//! - **Resources are finite and must be explicit**
//! - **Limits are enforced, not advisory**
//! - **Limits are plain data**: they load from configuration and compare
//!   deterministically in tests
//! - **This crate defines limits, it does not enforce them**: the sandbox host
//!   configures its engine from [`SandboxLimits`], the loader checks manifests
//!   against [`ManifestBudget`]
//!
//! ## Core Concepts
//!
//! - Resource types: `MemoryBytes`, `StackBytes`
//! - `SandboxLimits`: Per-instance memory/stack/time ceilings
//! - `ManifestBudget`: Asset counts and dimensions a guest may declare
//! - `ResourceExceeded`: Which limit was breached
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - An allocator or a scheduler
//! - OS-level limits (ulimits, cgroups)
//! - Global mutable counters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Bytes of guest heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemoryBytes(pub u64);

impl MemoryBytes {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn from_mib(mib: u64) -> Self {
        Self(mib.saturating_mul(MIB))
    }

    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for MemoryBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= MIB && self.0 % MIB == 0 {
            write!(f, "{} MiB", self.0 / MIB)
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// Bytes of guest call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StackBytes(pub u64);

impl StackBytes {
    /// Accounted cost of one guest call frame
    pub const FRAME_COST: u64 = 256;

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn from_mib(mib: u64) -> Self {
        Self(mib.saturating_mul(MIB))
    }

    /// Maximum call depth this stack allows
    pub fn max_depth(&self) -> usize {
        usize::try_from(self.0 / Self::FRAME_COST).unwrap_or(usize::MAX)
    }
}

impl fmt::Display for StackBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= MIB && self.0 % MIB == 0 {
            write!(f, "{} MiB", self.0 / MIB)
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// Ceilings applied to one sandbox instance
///
/// Timeouts are stored in milliseconds so configuration files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    pub memory: MemoryBytes,
    pub stack: StackBytes,
    /// Wall-clock ceiling of one `update` call
    pub call_timeout_ms: u64,
    /// Wall-clock ceiling of each load step (chunk, `metadata()`, `resources()`)
    pub load_timeout_ms: u64,
    /// VM instructions between interrupt polls
    pub poll_interval: u32,
    pub max_commands_per_frame: usize,
    pub max_source_bytes: usize,
}

impl SandboxLimits {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn max_call_depth(&self) -> usize {
        self.stack.max_depth()
    }

    /// Builder: sets the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder: sets the memory ceiling
    pub fn with_memory(mut self, memory: MemoryBytes) -> Self {
        self.memory = memory;
        self
    }

    /// Builder: sets the stack ceiling
    pub fn with_stack(mut self, stack: StackBytes) -> Self {
        self.stack = stack;
        self
    }

    /// Builder: sets the interrupt polling interval
    pub fn with_poll_interval(mut self, instructions: u32) -> Self {
        self.poll_interval = instructions;
        self
    }

    /// Rejects limits an engine cannot be configured with
    pub fn validate(&self) -> Result<(), ResourceError> {
        let invalid = |reason: &str| {
            Err(ResourceError::InvalidLimits {
                reason: reason.to_string(),
            })
        };
        if self.memory.0 < MIB {
            return invalid("memory limit must be at least 1 MiB");
        }
        if self.stack.max_depth() < 16 {
            return invalid("stack limit allows fewer than 16 call frames");
        }
        if self.call_timeout_ms == 0 || self.load_timeout_ms == 0 {
            return invalid("timeouts must be non-zero");
        }
        if self.poll_interval == 0 {
            return invalid("poll interval must be non-zero");
        }
        if self.max_commands_per_frame == 0 {
            return invalid("command limit must be non-zero");
        }
        Ok(())
    }
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory: MemoryBytes::from_mib(16),
            stack: StackBytes::from_mib(1),
            call_timeout_ms: 50,
            load_timeout_ms: 1000,
            poll_interval: 1000,
            max_commands_per_frame: 10_000,
            max_source_bytes: 200 * KIB as usize,
        }
    }
}

impl fmt::Display for SandboxLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SandboxLimits[memory={}, stack={}, call={}ms, load={}ms]",
            self.memory, self.stack, self.call_timeout_ms, self.load_timeout_ms
        )
    }
}

/// Limits on what a guest may declare in its resource manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestBudget {
    pub max_images: usize,
    pub max_image_side: u32,
    pub max_sounds: usize,
}

impl ManifestBudget {
    pub fn check_counts(&self, images: usize, sounds: usize) -> Result<(), ResourceExceeded> {
        if images > self.max_images {
            return Err(ResourceExceeded::ImageCount {
                limit: self.max_images,
                declared: images,
            });
        }
        if sounds > self.max_sounds {
            return Err(ResourceExceeded::SoundCount {
                limit: self.max_sounds,
                declared: sounds,
            });
        }
        Ok(())
    }

    /// Checks declared image dimensions; missing sides are not checked here
    pub fn check_image(
        &self,
        id: &str,
        w: Option<f64>,
        h: Option<f64>,
    ) -> Result<(), ResourceExceeded> {
        let limit = self.max_image_side as f64;
        if w.is_some_and(|w| w > limit) || h.is_some_and(|h| h > limit) {
            return Err(ResourceExceeded::ImageSize {
                id: id.to_string(),
                limit: self.max_image_side,
            });
        }
        Ok(())
    }
}

impl Default for ManifestBudget {
    fn default() -> Self {
        Self {
            max_images: 20,
            max_image_side: 512,
            max_sounds: 20,
        }
    }
}

/// Which limit was breached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceExceeded {
    Memory { limit: MemoryBytes },
    Stack { limit: StackBytes },
    ImageCount { limit: usize, declared: usize },
    ImageSize { id: String, limit: u32 },
    SoundCount { limit: usize, declared: usize },
}

impl ResourceExceeded {
    /// True for breaches of the engine's runtime ceilings
    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Memory { .. } | Self::Stack { .. })
    }
}

impl fmt::Display for ResourceExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory { limit } => write!(f, "memory limit exceeded: limit={}", limit),
            Self::Stack { limit } => write!(f, "stack limit exceeded: limit={}", limit),
            Self::ImageCount { limit, declared } => {
                write!(f, "max {} images allowed, declared {}", limit, declared)
            }
            Self::ImageSize { id, limit } => {
                write!(f, "image \"{}\" exceeds {}x{} limit", id, limit, limit)
            }
            Self::SoundCount { limit, declared } => {
                write!(f, "max {} sounds allowed, declared {}", limit, declared)
            }
        }
    }
}

/// Resource-related errors
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource limit exceeded: {0}")]
    LimitExceeded(ResourceExceeded),

    #[error("Invalid limits: {reason}")]
    InvalidLimits { reason: String },
}

impl From<ResourceExceeded> for ResourceError {
    fn from(exceeded: ResourceExceeded) -> Self {
        ResourceError::LimitExceeded(exceeded)
    }
}
