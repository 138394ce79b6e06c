use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;

use ext_meta::{
    ExtensionDescriptor, ExtensionId, InstallationLedger, InstallationRecord, LedgerError,
    Namespace,
};

use super::Ledger;

/// Ledger persisted as a TOML file.
///
/// Every mutation re-reads the file, applies the change and writes it back
/// while holding an exclusive lock on a `.lock` file next to it, so processes
/// sharing the ledger never lose each other's records. Queries read the
/// file under a shared lock and return read failures to the caller.
#[derive(Debug)]
pub struct TomlLedger {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write: Mutex<()>,
}

impl TomlLedger {
    /// Open the ledger at `path`, creating an empty file if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if !path.exists() {
            Ledger::new().save(&path)?;
        } else {
            // Fail early on a corrupt file rather than at first use.
            Ledger::load(&path)?;
        }
        tracing::debug!(path = %path.display(), "Opened ledger");
        Ok(Self {
            path,
            write: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document on disk.
    pub fn load(&self) -> Result<Ledger, LedgerError> {
        Ledger::load_or_default(&self.path)
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let _write = self.write.lock().unwrap_or_else(PoisonError::into_inner);

        let lock_path = self.path.with_extension("toml.lock");
        let storage = |err: std::io::Error| {
            LedgerError::storage(format!("cannot lock ledger {}", self.path.display()), err)
        };
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(storage)?;
        lock_file.lock_exclusive().map_err(storage)?;

        let mut ledger = self.load()?;
        let value = change(&mut ledger)?;
        ledger.save(&self.path)?;
        Ok(value)
    }

    fn read<T>(&self, query: impl FnOnce(&Ledger) -> T) -> Result<T, LedgerError> {
        let ledger = self.load().inspect_err(|err| {
            tracing::debug!(path = %self.path.display(), error = %err, "Failed to read ledger");
        })?;
        Ok(query(&ledger))
    }
}

impl InstallationLedger for TomlLedger {
    fn record_install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError> {
        self.mutate(|ledger| ledger.install(descriptor, namespace))
    }

    fn record_uninstall(
        &self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> Result<Vec<Namespace>, LedgerError> {
        self.mutate(|ledger| ledger.uninstall(id, namespace))
    }

    fn record_upgrade(
        &self,
        previous: &ExtensionId,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError> {
        self.mutate(|ledger| ledger.upgrade(previous, new, namespace))
    }

    fn resolve(&self, id: &ExtensionId) -> Result<Option<InstallationRecord>, LedgerError> {
        self.read(|ledger| ledger.get(id).cloned())
    }

    fn installed_by_feature(
        &self,
        feature: &str,
        namespace: &Namespace,
    ) -> Result<Option<InstallationRecord>, LedgerError> {
        self.read(|ledger| ledger.find_feature(feature, namespace).cloned())
    }

    fn records(&self) -> Result<Vec<InstallationRecord>, LedgerError> {
        self.read(|ledger| ledger.records().to_vec())
    }
}
