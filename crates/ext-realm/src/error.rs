//! Error types for ext-realm

use ext_meta::{ExtensionId, Namespace};

use crate::realm::RealmId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The realm was torn down and can no longer load symbols.
    #[error("realm {realm} has been destroyed")]
    Destroyed { realm: RealmId },

    /// Another extension already defines the symbol in this realm.
    #[error("symbol '{symbol}' is already defined in realm {realm} by {provider}")]
    SymbolConflict {
        symbol: String,
        realm: RealmId,
        provider: ExtensionId,
    },

    /// `release` was called without a matching `acquire`.
    #[error("no realm member to release in {namespace}")]
    NotAcquired { namespace: Namespace },
}
