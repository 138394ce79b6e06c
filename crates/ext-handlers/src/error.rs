//! Error types for ext-handlers
//!
//! [`InstallError`] and [`UninstallError`] are the operation-level errors
//! callers see. Handlers report failures as [`HandlerError`]; the dispatcher
//! wraps them into the operation error, except when the handler already
//! produced an error of the right kind.

use std::path::PathBuf;

use ext_meta::{AlreadyInstalledError, ExtensionId, LedgerError, Namespace, NotInstalledError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// No handler is registered for the declared extension type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no handler registered for type '{extension_type}' of extension {id}")]
pub struct NoHandlerFoundError {
    pub id: ExtensionId,
    pub extension_type: String,
}

/// Failure reported by an [`ExtensionHandler`](crate::ExtensionHandler).
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Already an install failure; propagated as-is by upgrade.
    #[error(transparent)]
    Install(Box<InstallError>),

    /// Already an uninstall failure; propagated as-is by uninstall.
    #[error(transparent)]
    Uninstall(Box<UninstallError>),

    #[error(transparent)]
    Realm(#[from] ext_realm::Error),

    #[error("artifact not found: {0}")]
    ArtifactMissing(PathBuf),

    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<InstallError> for HandlerError {
    fn from(err: InstallError) -> Self {
        Self::Install(Box::new(err))
    }
}

impl From<UninstallError> for HandlerError {
    fn from(err: UninstallError) -> Self {
        Self::Uninstall(Box::new(err))
    }
}

/// An install, upgrade or initialize operation failed.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("failed to install extension: {0}")]
    NoHandler(#[from] NoHandlerFoundError),

    #[error("failed to install extension: {0}")]
    AlreadyInstalled(#[from] AlreadyInstalledError),

    /// Upgrade of an extension that is not installed in the namespace.
    #[error("failed to upgrade extension: {0}")]
    NotInstalled(#[from] NotInstalledError),

    #[error("failed to install extension: {0}")]
    InvalidDescriptor(#[from] ext_meta::Error),

    /// A declared dependency is installed neither in the target namespace
    /// nor globally.
    #[error("failed to install {id} in {namespace}: dependency {dependency} is not installed")]
    UnresolvedDependency {
        id: ExtensionId,
        dependency: ExtensionId,
        namespace: Namespace,
    },

    #[error("failed to install {id} in {namespace}")]
    Handler {
        id: ExtensionId,
        namespace: Namespace,
        #[source]
        source: HandlerError,
    },

    #[error("failed to initialize {id} in {namespace}")]
    InitializeFailed {
        id: ExtensionId,
        namespace: Namespace,
        #[source]
        source: HandlerError,
    },

    #[error("failed to record installation: {0}")]
    Ledger(#[source] LedgerError),
}

impl From<LedgerError> for InstallError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyInstalled(err) => Self::AlreadyInstalled(err),
            LedgerError::NotInstalled(err) => Self::NotInstalled(err),
            other => Self::Ledger(other),
        }
    }
}

/// An uninstall operation failed.
#[derive(Debug, thiserror::Error)]
pub enum UninstallError {
    #[error("failed to uninstall extension: {0}")]
    NoHandler(#[from] NoHandlerFoundError),

    #[error("failed to uninstall extension: {0}")]
    NotInstalled(#[from] NotInstalledError),

    #[error("failed to uninstall {id} from {namespace}")]
    Handler {
        id: ExtensionId,
        namespace: Namespace,
        #[source]
        source: HandlerError,
    },

    /// Recorded installations could not be brought back before the uninstall.
    #[error("failed to uninstall extension: {0}")]
    Initialize(#[source] Box<InstallError>),

    #[error("failed to record uninstallation: {0}")]
    Ledger(#[source] LedgerError),
}

impl From<LedgerError> for UninstallError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotInstalled(err) => Self::NotInstalled(err),
            other => Self::Ledger(other),
        }
    }
}
