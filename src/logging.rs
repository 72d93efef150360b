//! Logging setup
//!
//! Optional helper wiring `tracing` output for binaries embedding the
//! engine. Libraries should not install a subscriber on their own; call
//! [`init`] once from your application entry point.

use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is unset
const DEFAULT_DIRECTIVE: &str = "agent_settings=info";

/// Initialize a fmt subscriber with an env-filter
///
/// Respects `RUST_LOG` when set. Safe to call more than once; later calls
/// are no-ops.
pub fn init() {
    init_with_default(DEFAULT_DIRECTIVE);
}

/// Initialize with a custom default directive
pub fn init_with_default(directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init(); // second call must not panic
        init_with_default("debug");
    }
}
