//! Shared test utilities for the extension manager workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`fixtures`]: descriptor and namespace shorthands
//! - [`handler`]: [`ScriptedHandler`] for call recording and failure injection
//! - [`engine`]: [`TestEngine`] harness wiring an engine to the scripted handler

pub mod engine;
pub mod fixtures;
pub mod handler;

pub use engine::TestEngine;
pub use fixtures::{component, id, jar, ns, scripted};
pub use handler::{Call, FailureKind, Operation, SCRIPTED_TYPE, ScriptedHandler};
