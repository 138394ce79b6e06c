//! Installation ledger contract.
//!
//! The lifecycle engine records and queries installations exclusively through
//! this trait, so the store behind it (memory, a TOML file, a database) can
//! be swapped without touching the engine.

use crate::descriptor::ExtensionDescriptor;
use crate::error::LedgerError;
use crate::id::ExtensionId;
use crate::namespace::Namespace;
use crate::record::InstallationRecord;

/// Store of [`InstallationRecord`]s.
///
/// Every mutating method is a single atomic check-then-write: the conflict
/// check and the write happen under the same critical section, and a failed
/// call leaves the store unchanged. Queries report storage failures instead
/// of answering "not installed".
pub trait InstallationLedger: Send + Sync {
    /// Add a membership for `descriptor.id` in `namespace`.
    ///
    /// Creates the record on first install. Fails with
    /// [`LedgerError::AlreadyInstalled`] when the id is global, when a global
    /// install is requested while namespace memberships exist, or when the
    /// namespace is already a member.
    fn record_install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError>;

    /// Remove a membership and return the namespaces that were removed.
    ///
    /// [`Namespace::Global`] removes the record and all of its memberships.
    /// The record is deleted when its last membership goes.
    fn record_uninstall(
        &self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> Result<Vec<Namespace>, LedgerError>;

    /// Move the `namespace` membership of `previous` to `new`.
    ///
    /// The previous record loses the membership (and is deleted if it was the
    /// last one); the record for `new.id` gains it.
    fn record_upgrade(
        &self,
        previous: &ExtensionId,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError>;

    /// Namespace-exact membership test.
    fn is_installed(&self, id: &ExtensionId, namespace: &Namespace) -> Result<bool, LedgerError> {
        Ok(self
            .resolve(id)?
            .is_some_and(|record| record.is_installed(namespace)))
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Option<InstallationRecord>, LedgerError>;

    /// Record installed in `namespace` whose id name or declared feature is `feature`.
    fn installed_by_feature(
        &self,
        feature: &str,
        namespace: &Namespace,
    ) -> Result<Option<InstallationRecord>, LedgerError>;

    /// Every record, ordered by extension id.
    fn records(&self) -> Result<Vec<InstallationRecord>, LedgerError>;
}
