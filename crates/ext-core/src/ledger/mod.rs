//! Installation ledgers
//!
//! [`Ledger`] is the serializable document holding every installation
//! record, together with the membership rules applied on each mutation. The
//! stores built on it implement [`InstallationLedger`](ext_meta::InstallationLedger):
//!
//! - [`MemoryLedger`] keeps the document in process memory
//! - [`TomlLedger`] persists it as a TOML file shared between processes

mod file;
mod memory;

pub use file::TomlLedger;
pub use memory::MemoryLedger;

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::Path;

use ext_meta::{
    ExtensionDescriptor, ExtensionId, InstallationRecord, LedgerError, Namespace,
    NotInstalledError,
};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

const LEDGER_VERSION: &str = "1.0";

/// Every installation record, ordered by extension id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Ledger format version for forward compatibility
    version: String,
    #[serde(default)]
    records: Vec<InstallationRecord>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION.to_string(),
            records: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Load a ledger from a TOML file with shared lock
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read, locked, or parsed.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let storage = |err: std::io::Error| {
            LedgerError::storage(format!("cannot read ledger {}", path.display()), err)
        };
        let file = File::open(path).map_err(storage)?;
        file.lock_shared().map_err(storage)?;

        // Read through the locked handle so a concurrent rename can't interleave
        let mut content = String::new();
        (&file).read_to_string(&mut content).map_err(storage)?;
        toml::from_str(&content).map_err(|err| {
            LedgerError::storage(format!("cannot parse ledger {}", path.display()), err)
        })
    }

    /// Load `path`, or start empty when it does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self, LedgerError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save the ledger to a TOML file atomically with exclusive lock
    ///
    /// Writes a temporary file next to `path` and renames it over the target.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let storage = |err: std::io::Error| {
            LedgerError::storage(format!("cannot write ledger {}", path.display()), err)
        };
        let content = toml::to_string_pretty(self).map_err(|err| {
            LedgerError::storage(format!("cannot serialize ledger {}", path.display()), err)
        })?;

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(storage)?;
            }
        }
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(storage)?;
        lock_file.lock_exclusive().map_err(storage)?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &content).map_err(storage)?;
        fs::rename(&temp_path, path).map_err(storage)?;

        // Lock released when lock_file is dropped
        Ok(())
    }

    /// Every record, ordered by extension id
    pub fn records(&self) -> &[InstallationRecord] {
        &self.records
    }

    pub fn get(&self, id: &ExtensionId) -> Option<&InstallationRecord> {
        self.position(id).ok().map(|pos| &self.records[pos])
    }

    /// Record installed in `namespace` whose id name or a declared feature is `feature`
    pub fn find_feature(&self, feature: &str, namespace: &Namespace) -> Option<&InstallationRecord> {
        self.records
            .iter()
            .find(|record| record.is_installed(namespace) && record.descriptor.provides(feature))
    }

    /// Add the `namespace` membership for `descriptor.id`
    pub fn install(
        &mut self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError> {
        match self.position(&descriptor.id) {
            Ok(pos) => {
                let record = &mut self.records[pos];
                record.scope_mut().admit(&descriptor.id, namespace)?;
                Ok(record.clone())
            }
            Err(pos) => {
                let record = InstallationRecord::new(descriptor.clone(), namespace);
                self.records.insert(pos, record.clone());
                Ok(record)
            }
        }
    }

    /// Remove the `namespace` membership of `id`, dropping the record when it was the last
    pub fn uninstall(
        &mut self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> Result<Vec<Namespace>, LedgerError> {
        let pos = self.position(id).map_err(|_| NotInstalledError {
            id: id.clone(),
            namespace: namespace.clone(),
        })?;
        let removed = self.records[pos].scope_mut().withdraw(id, namespace)?;
        if self.records[pos].scope().is_empty() {
            self.records.remove(pos);
        }
        Ok(removed)
    }

    /// Move the `namespace` membership of `previous` to `new`
    ///
    /// Every check runs before the first change, so a failed upgrade leaves
    /// the ledger untouched.
    pub fn upgrade(
        &mut self,
        previous: &ExtensionId,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> Result<InstallationRecord, LedgerError> {
        let not_installed = || NotInstalledError {
            id: previous.clone(),
            namespace: namespace.clone(),
        };
        let pos = self.position(previous).map_err(|_| not_installed())?;
        if !self.records[pos].is_installed(namespace) {
            return Err(not_installed().into());
        }

        if previous == &new.id {
            let record = &mut self.records[pos];
            record.descriptor = new.clone();
            return Ok(record.clone());
        }

        if let Some(existing) = self.get(&new.id) {
            existing.scope().clone().admit(&new.id, namespace)?;
        }
        self.uninstall(previous, namespace)?;
        self.install(new, namespace)
    }

    fn position(&self, id: &ExtensionId) -> Result<usize, usize> {
        self.records.binary_search_by(|record| record.id().cmp(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ext_meta::InstallScope;
    use pretty_assertions::assert_eq;

    fn descriptor(name: &str, version: &str) -> ExtensionDescriptor {
        ExtensionDescriptor::new(ExtensionId::new(name, version), "jar", format!("{name}.jar"))
    }

    fn ns(name: &str) -> Namespace {
        Namespace::named(name)
    }

    #[test]
    fn ledger_new_has_correct_version() {
        let ledger = Ledger::new();
        assert_eq!(ledger.version(), "1.0");
    }

    #[test]
    fn records_stay_sorted_by_id() {
        let mut ledger = Ledger::new();
        ledger.install(&descriptor("b:pkg", "1"), &ns("ns1")).unwrap();
        ledger.install(&descriptor("a:pkg", "1"), &ns("ns1")).unwrap();
        ledger.install(&descriptor("c:pkg", "1"), &Namespace::Global).unwrap();

        let names: Vec<_> = ledger.records().iter().map(|r| r.id().name()).collect();
        assert_eq!(names, vec!["a:pkg", "b:pkg", "c:pkg"]);
    }

    #[test]
    fn second_namespace_extends_existing_record() {
        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1");
        ledger.install(&pkg, &ns("ns1")).unwrap();
        let record = ledger.install(&pkg, &ns("ns2")).unwrap();

        assert_eq!(record.namespaces(), vec![ns("ns1"), ns("ns2")]);
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn failed_install_leaves_record_unchanged() {
        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1");
        ledger.install(&pkg, &ns("ns1")).unwrap();
        let before = ledger.clone();

        assert!(matches!(
            ledger.install(&pkg, &ns("ns1")),
            Err(LedgerError::AlreadyInstalled(_))
        ));
        assert!(matches!(
            ledger.install(&pkg, &Namespace::Global),
            Err(LedgerError::AlreadyInstalled(_))
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn uninstall_last_membership_drops_record() {
        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1");
        ledger.install(&pkg, &ns("ns1")).unwrap();
        ledger.install(&pkg, &ns("ns2")).unwrap();

        assert_eq!(ledger.uninstall(&pkg.id, &ns("ns1")).unwrap(), vec![ns("ns1")]);
        assert!(ledger.get(&pkg.id).is_some());
        assert_eq!(ledger.uninstall(&pkg.id, &ns("ns2")).unwrap(), vec![ns("ns2")]);
        assert!(ledger.get(&pkg.id).is_none());
    }

    #[test]
    fn uninstall_global_removes_every_membership() {
        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1");
        ledger.install(&pkg, &ns("ns1")).unwrap();
        ledger.install(&pkg, &ns("ns2")).unwrap();

        let removed = ledger.uninstall(&pkg.id, &Namespace::Global).unwrap();
        assert_eq!(removed, vec![ns("ns1"), ns("ns2")]);
        assert!(ledger.records().is_empty());
        assert!(matches!(
            ledger.uninstall(&pkg.id, &Namespace::Global),
            Err(LedgerError::NotInstalled(_))
        ));
    }

    #[test]
    fn upgrade_moves_only_the_given_membership() {
        let mut ledger = Ledger::new();
        let v1 = descriptor("a:pkg", "1");
        let v2 = descriptor("a:pkg", "2");
        ledger.install(&v1, &ns("ns1")).unwrap();
        ledger.install(&v1, &ns("ns2")).unwrap();

        let record = ledger.upgrade(&v1.id, &v2, &ns("ns1")).unwrap();
        assert_eq!(record.id(), &v2.id);
        assert_eq!(record.namespaces(), vec![ns("ns1")]);
        assert_eq!(ledger.get(&v1.id).unwrap().namespaces(), vec![ns("ns2")]);
    }

    #[test]
    fn upgrade_same_id_replaces_descriptor_in_place() {
        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1");
        let installed = ledger.install(&pkg, &Namespace::Global).unwrap();
        let rebuilt = pkg.clone().with_export("pkg.Main");

        let record = ledger.upgrade(&pkg.id, &rebuilt, &Namespace::Global).unwrap();
        assert_eq!(record.descriptor, rebuilt);
        assert_eq!(record.scope(), &InstallScope::Global);
        assert_eq!(record.installed_at, installed.installed_at);
    }

    #[test]
    fn upgrade_into_conflicting_scope_changes_nothing() {
        let mut ledger = Ledger::new();
        let v1 = descriptor("a:pkg", "1");
        let v2 = descriptor("a:pkg", "2");
        ledger.install(&v1, &ns("ns1")).unwrap();
        ledger.install(&v2, &Namespace::Global).unwrap();
        let before = ledger.clone();

        assert!(matches!(
            ledger.upgrade(&v1.id, &v2, &ns("ns1")),
            Err(LedgerError::AlreadyInstalled(_))
        ));
        assert!(matches!(
            ledger.upgrade(&v1.id, &v2, &ns("ns9")),
            Err(LedgerError::NotInstalled(_))
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn finds_records_by_feature_in_namespace() {
        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1").with_feature("pkg-api");
        ledger.install(&pkg, &ns("ns1")).unwrap();

        assert_eq!(
            ledger.find_feature("pkg-api", &ns("ns1")).map(|r| r.id()),
            Some(&pkg.id)
        );
        assert_eq!(
            ledger.find_feature("a:pkg", &ns("ns1")).map(|r| r.id()),
            Some(&pkg.id)
        );
        assert!(ledger.find_feature("pkg-api", &ns("ns2")).is_none());
        assert!(ledger.find_feature("pkg-api", &Namespace::Global).is_none());
    }

    #[test]
    fn ledger_save_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");

        let mut ledger = Ledger::new();
        let pkg = descriptor("a:pkg", "1")
            .with_dependency(ExtensionId::new("a:dep", "1"))
            .with_export("pkg.Main");
        ledger.install(&pkg, &ns("ns1")).unwrap();
        ledger.install(&descriptor("a:dep", "1"), &Namespace::Global).unwrap();
        ledger.save(&path).unwrap();

        let temp_path = path.with_extension("toml.tmp");
        assert!(!temp_path.exists(), "Temporary file should be cleaned up");

        let loaded = Ledger::load(&path).unwrap();
        assert_eq!(loaded, ledger);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("version = \"1.0\""));
        assert!(raw.contains("a:pkg"));
    }

    #[test]
    fn load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "version = [").unwrap();

        assert!(matches!(Ledger::load(&path), Err(LedgerError::Storage { .. })));
    }

    #[test]
    fn load_or_default_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(ledger.records().is_empty());
    }
}
