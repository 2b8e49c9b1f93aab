//! Resilience Test Utilities
//!
//! Shared guest builders for the cross-crate tests in `tests/`.
//!
//! ## Test Philosophy
//!
//! - **Hostile by default**: Guests try to hang, exhaust or escape the host
//! - **Host survives**: A bad guest ends its own instance at worst, never the
//!   process and never a neighbouring instance
//! - **Deterministic**: Timeouts that do not need a real clock use a manual one

use game_types::InputSnapshot;
use resources::SandboxLimits;
use sandbox_host::{FrameOutput, HostError, SandboxHost};

/// Default declarations every guest starts from
pub const METADATA: &str = r#"function metadata() return { title = "Test" } end"#;

/// Builds a guest whose `update(dt, input)` has the given body
pub fn guest(update_body: &str) -> String {
    guest_with_resources("return {}", update_body)
}

/// Builds a guest with both a `resources()` body and an `update` body
pub fn guest_with_resources(resources_body: &str, update_body: &str) -> String {
    format!(
        "{METADATA}\nfunction resources() {resources_body} end\nfunction update(dt, input) {update_body} end\n"
    )
}

/// A host with `source` loaded under default limits
///
/// Panics on load failure; tests that expect one call `load` themselves.
pub fn loaded(source: &str) -> SandboxHost {
    let mut host = SandboxHost::new(SandboxLimits::default());
    if let Err(err) = host.load(source) {
        panic!("guest failed to load: {err}");
    }
    host
}

/// One frame with no input held
pub fn step(host: &mut SandboxHost) -> Result<FrameOutput, HostError> {
    host.call_update(1.0 / 60.0, &InputSnapshot::default())
}
