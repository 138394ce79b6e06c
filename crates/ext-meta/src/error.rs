//! Error types for ext-meta

use std::path::PathBuf;

use crate::id::ExtensionId;
use crate::namespace::Namespace;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing identities and descriptor manifests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to parse a descriptor manifest.
    #[error("failed to parse extension manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    /// Descriptor manifest not found at the expected path.
    #[error("extension manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// An extension id string could not be parsed.
    #[error("invalid extension id '{value}': {reason}")]
    InvalidId { value: String, reason: String },

    /// The descriptor is structurally invalid.
    #[error("invalid descriptor for extension {id}: {reason}")]
    InvalidDescriptor { id: ExtensionId, reason: String },

    /// I/O error reading a manifest.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A conflicting membership is already present for the requested scope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extension {id} is already installed ({existing}), can't install it in {namespace}")]
pub struct AlreadyInstalledError {
    pub id: ExtensionId,
    pub namespace: Namespace,
    /// Human readable description of the conflicting membership.
    pub existing: String,
}

/// The requested membership does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extension {id} is not installed in {namespace}")]
pub struct NotInstalledError {
    pub id: ExtensionId,
    pub namespace: Namespace,
}

/// Errors returned by [`InstallationLedger`](crate::InstallationLedger) implementations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    AlreadyInstalled(#[from] AlreadyInstalledError),

    #[error(transparent)]
    NotInstalled(#[from] NotInstalledError),

    /// The backing store could not be read or written.
    #[error("ledger storage failure: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LedgerError {
    /// Build a storage error from any underlying cause.
    pub fn storage(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}
