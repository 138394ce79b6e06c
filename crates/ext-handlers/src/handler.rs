//! ExtensionHandler trait

use async_trait::async_trait;
use ext_meta::{ExtensionDescriptor, Namespace};
use ext_realm::Realm;

use crate::error::HandlerError;

/// Type-specific strategy that loads and unloads extensions of one type.
///
/// Every call receives the realm the extension lives in. The engine only
/// writes the ledger after a call succeeds, so an error must leave the realm
/// as it was before the call.
#[async_trait]
pub trait ExtensionHandler: Send + Sync {
    /// Type tag this handler serves (matched case-insensitively).
    fn extension_type(&self) -> &str;

    async fn install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError>;

    async fn uninstall(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError>;

    /// Replace `previous` with `new` in place; the realm is kept.
    async fn upgrade(
        &self,
        previous: &ExtensionDescriptor,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError>;

    /// Re-establish an extension recorded by an earlier process.
    async fn initialize(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError>;
}
