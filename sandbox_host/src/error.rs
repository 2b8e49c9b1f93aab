//! Error taxonomy of the execution host.
//!
//! Only conditions that end an instance are `Err` values of
//! [`SandboxHost::call_update`](crate::SandboxHost::call_update). Frame-level
//! failures are reported in-band as a [`FrameFault`] next to a diagnostic
//! command.

use game_types::{CommandDecodeError, ManifestError, MetadataError};
use resources::ResourceExceeded;
use thiserror::Error;

/// A value could not cross the sandbox boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("{path}: {kind} values cannot leave the sandbox")]
    Unsupported { path: String, kind: &'static str },

    #[error("{path}: cyclic table")]
    Cycle { path: String },

    #[error("{path}: nesting deeper than {limit} levels")]
    TooDeep { path: String, limit: usize },

    #[error("value has more than {limit} elements")]
    TooLarge { limit: usize },

    #[error("{path}: non-finite number")]
    NonFinite { path: String },

    #[error("{path}: {reason}")]
    InvalidKey { path: String, reason: String },

    #[error("{path}: string is not valid UTF-8")]
    InvalidString { path: String },

    #[error(transparent)]
    Commands(#[from] CommandDecodeError),

    #[error("engine error during conversion: {0}")]
    Engine(String),
}

/// Why `load` rejected a guest program
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("game source is {size} bytes (limit {limit})")]
    SourceTooLarge { size: usize, limit: usize },

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("game evaluation failed: {0}")]
    Evaluation(String),

    #[error("missing {0}() function")]
    MissingEntryPoint(&'static str),

    #[error("{entry}() error: {message}")]
    EntryPointFailed { entry: &'static str, message: String },

    #[error("{stage} did not finish within {limit_ms} ms")]
    Timeout { stage: &'static str, limit_ms: u64 },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] MetadataError),

    #[error("invalid resources: {0}")]
    InvalidManifest(String),

    #[error("{entry}() returned a value that cannot leave the sandbox: {source}")]
    Marshal {
        entry: &'static str,
        #[source]
        source: MarshalError,
    },

    #[error("resource limit exceeded during load: {0}")]
    ResourceLimitExceeded(ResourceExceeded),

    #[error("engine setup failed: {0}")]
    Engine(String),

    #[error("a game is already loaded in this instance")]
    AlreadyLoaded,

    #[error("instance has been disposed")]
    Disposed,
}

impl From<ManifestError> for LoadError {
    fn from(err: ManifestError) -> Self {
        LoadError::InvalidManifest(err.to_string())
    }
}

impl From<ResourceExceeded> for LoadError {
    fn from(exceeded: ResourceExceeded) -> Self {
        if exceeded.is_runtime() {
            LoadError::ResourceLimitExceeded(exceeded)
        } else {
            LoadError::InvalidManifest(exceeded.to_string())
        }
    }
}

/// Conditions fatal to an instance (or calls on an unusable one)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("no game loaded")]
    NotLoaded,

    #[error("instance has been disposed")]
    Disposed,

    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(ResourceExceeded),

    #[error("instance is unusable after an earlier breach ({0}); dispose and reload")]
    InstancePoisoned(ResourceExceeded),
}

/// A non-fatal failure of one `update` call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameFault {
    #[error("{0}")]
    Runtime(String),

    #[error("update() timed out: {0}")]
    Timeout(String),

    #[error("update() returned invalid commands: {0}")]
    Marshal(#[from] MarshalError),
}
