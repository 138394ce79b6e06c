//! Namespace-scoped extension lifecycle engine
//!
//! This crate ties the lower layers together:
//!
//! - **Installation ledgers**: in-memory and TOML-file stores of installation records
//! - **LifecycleEngine**: install, uninstall and upgrade with namespace isolation
//! - **Operation locks**: per `(extension, namespace)` serialization
//! - **Configuration**: TOML engine configuration
//!
//! # Architecture
//!
//! ```text
//!                   host / caller
//!                         |
//!                     ext-core
//!                         |
//!           +-------------+-------------+
//!           |             |             |
//!     ext-handlers    ext-realm      ext-meta
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ext_core::{EngineConfig, LifecycleEngine};
//! use ext_meta::{ExtensionDescriptor, ExtensionId, Namespace};
//!
//! async fn example() -> ext_core::Result<()> {
//!     let engine = LifecycleEngine::from_config(&EngineConfig::default())?;
//!     let pkg = ExtensionDescriptor::new(ExtensionId::new("a:pkg", "1.0"), "jar", "pkg.jar");
//!     engine.install(&pkg, &Namespace::named("ns1")).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod logging;

pub use config::EngineConfig;
pub use engine::LifecycleEngine;
pub use error::{Error, Result};
pub use ledger::{Ledger, MemoryLedger, TomlLedger};
pub use locks::{OperationGuard, OperationLocks};
