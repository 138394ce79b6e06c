//! Extension identities, descriptors and installation records.
//!
//! This crate holds the data model shared by every layer of the extension
//! manager:
//!
//! - [`ExtensionId`] and [`Namespace`] address an installation
//! - [`ExtensionDescriptor`] is the resolved extension handed in by callers
//! - [`InstallScope`] and [`InstallationRecord`] describe where an extension
//!   is currently installed
//! - [`InstallationLedger`] is the storage contract the lifecycle engine
//!   records installations through

pub mod descriptor;
pub mod error;
pub mod id;
pub mod ledger;
pub mod namespace;
pub mod record;

/// The canonical filename for extension descriptor manifests.
pub const MANIFEST_FILENAME: &str = "extension.toml";

pub use descriptor::ExtensionDescriptor;
pub use error::{AlreadyInstalledError, Error, LedgerError, NotInstalledError, Result};
pub use id::ExtensionId;
pub use ledger::InstallationLedger;
pub use namespace::Namespace;
pub use record::{InstallScope, InstallationRecord};
