//! Error types for ext-core

use std::path::PathBuf;

use ext_handlers::{InstallError, UninstallError};
use ext_meta::LedgerError;

/// Result type for ext-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration loading and engine startup.
///
/// Lifecycle operations return [`InstallError`] or [`UninstallError`]
/// directly; this type aggregates them for callers that drive several steps.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Recorded installations were already loaded into their realms
    #[error("Extensions are already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Uninstall(#[from] UninstallError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Descriptor manifest error from ext-meta
    #[error(transparent)]
    Meta(#[from] ext_meta::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}
