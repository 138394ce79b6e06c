//! Log output for processes hosting a [`LifecycleEngine`](crate::LifecycleEngine)
//!
//! The engine and its handlers only emit `tracing` events: lifecycle steps at
//! info, rollbacks and membership mismatches at warn, ledger reads at debug.
//! A host that has no subscriber of its own can install this one.

use tracing_subscriber::{EnvFilter, filter::ParseError, fmt, prelude::*};

/// Directives used when neither the host nor `RUST_LOG` names any.
pub const DEFAULT_DIRECTIVES: &str = "info";

/// Install the engine's subscriber, filtered by `RUST_LOG` or
/// [`DEFAULT_DIRECTIVES`].
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_with(None)
}

/// Install the engine's subscriber with explicit filter directives.
///
/// `Some` directives take precedence over `RUST_LOG`, so a host can pin e.g.
/// `"warn,ext_core=debug"` to trace lifecycle operations only. Fails instead
/// of panicking when a global subscriber is already installed.
pub fn init_with(directives: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let events = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter(directives)?)
        .with(events)
        .try_init()?;

    Ok(())
}

fn filter(directives: Option<&str>) -> Result<EnvFilter, ParseError> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES)),
    }
}
