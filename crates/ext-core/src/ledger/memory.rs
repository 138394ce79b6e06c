use std::sync::{Mutex, MutexGuard, PoisonError};

use ext_meta::{
    ExtensionDescriptor, ExtensionId, InstallationLedger, InstallationRecord, LedgerError,
    Namespace,
};

use super::Ledger;

/// Ledger kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<Ledger>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            state: Mutex::new(ledger),
        }
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> Ledger {
        self.state().clone()
    }

    fn state(&self) -> MutexGuard<'_, Ledger> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InstallationLedger for MemoryLedger {
    fn record_install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError> {
        self.state().install(descriptor, namespace)
    }

    fn record_uninstall(
        &self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> Result<Vec<Namespace>, LedgerError> {
        self.state().uninstall(id, namespace)
    }

    fn record_upgrade(
        &self,
        previous: &ExtensionId,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError> {
        self.state().upgrade(previous, new, namespace)
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Option<InstallationRecord>, LedgerError> {
        Ok(self.state().get(id).cloned())
    }

    fn installed_by_feature(
        &self,
        feature: &str,
        namespace: &Namespace,
    ) -> Result<Option<InstallationRecord>, LedgerError> {
        Ok(self.state().find_feature(feature, namespace).cloned())
    }

    fn records(&self) -> Result<Vec<InstallationRecord>, LedgerError> {
        Ok(self.state().records().to_vec())
    }
}
