//! Installation scope and records.
//!
//! An id is either installed globally or in a set of named namespaces, never
//! both at once. [`InstallScope`] encodes that exclusivity in its shape, and
//! its `admit`/`withdraw` methods implement the membership conflict rules
//! every ledger shares.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::ExtensionDescriptor;
use crate::error::{AlreadyInstalledError, NotInstalledError};
use crate::id::ExtensionId;
use crate::namespace::Namespace;

/// Where an extension is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScopeRepr", into = "ScopeRepr")]
pub enum InstallScope {
    Global,
    /// Non-empty set of namespace names.
    Namespaces(BTreeSet<String>),
}

impl InstallScope {
    /// Scope containing exactly `namespace`.
    pub fn of(namespace: &Namespace) -> Self {
        match namespace {
            Namespace::Global => Self::Global,
            Namespace::Named(name) => Self::Namespaces(BTreeSet::from([name.clone()])),
        }
    }

    /// Namespace-exact membership test.
    ///
    /// A global query matches only a global install, and a named query never
    /// falls back to a global install.
    pub fn contains(&self, namespace: &Namespace) -> bool {
        match (self, namespace) {
            (Self::Global, Namespace::Global) => true,
            (Self::Namespaces(names), Namespace::Named(name)) => names.contains(name),
            _ => false,
        }
    }

    /// Every membership as a namespace value.
    pub fn namespaces(&self) -> Vec<Namespace> {
        match self {
            Self::Global => vec![Namespace::Global],
            Self::Namespaces(names) => names.iter().cloned().map(Namespace::Named).collect(),
        }
    }

    /// Add `namespace` to the scope.
    ///
    /// Fails when the id is already global, when installing globally while
    /// namespace memberships exist, or when the namespace is already present.
    pub fn admit(
        &mut self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> Result<(), AlreadyInstalledError> {
        if let (Self::Namespaces(names), Namespace::Named(name)) = (&mut *self, namespace) {
            if names.insert(name.clone()) {
                return Ok(());
            }
        }
        Err(AlreadyInstalledError {
            id: id.clone(),
            namespace: namespace.clone(),
            existing: self.to_string(),
        })
    }

    /// Remove `namespace` from the scope and return the removed memberships.
    ///
    /// Withdrawing [`Namespace::Global`] removes every membership at once.
    /// After a successful call the caller must drop the record when
    /// [`InstallScope::is_empty`] reports true.
    pub fn withdraw(
        &mut self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> Result<Vec<Namespace>, NotInstalledError> {
        match namespace {
            Namespace::Global => {
                let removed = self.namespaces();
                *self = Self::Namespaces(BTreeSet::new());
                Ok(removed)
            }
            Namespace::Named(name) => {
                let removed = match self {
                    Self::Namespaces(names) => names.remove(name),
                    Self::Global => false,
                };
                if removed {
                    Ok(vec![namespace.clone()])
                } else {
                    Err(NotInstalledError {
                        id: id.clone(),
                        namespace: namespace.clone(),
                    })
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Namespaces(names) if names.is_empty())
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("globally"),
            Self::Namespaces(names) => {
                let list: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "in namespaces [{}]", list.join(", "))
            }
        }
    }
}

/// Serialized form: a flag plus a namespace list, validated on load.
#[derive(Serialize, Deserialize)]
struct ScopeRepr {
    #[serde(default)]
    global: bool,
    #[serde(default)]
    namespaces: BTreeSet<String>,
}

impl TryFrom<ScopeRepr> for InstallScope {
    type Error = String;

    fn try_from(repr: ScopeRepr) -> Result<Self, Self::Error> {
        match (repr.global, repr.namespaces.is_empty()) {
            (true, true) => Ok(Self::Global),
            (false, false) => Ok(Self::Namespaces(repr.namespaces)),
            (true, false) => Err("scope is both global and namespaced".to_string()),
            (false, true) => Err("scope has no membership".to_string()),
        }
    }
}

impl From<InstallScope> for ScopeRepr {
    fn from(scope: InstallScope) -> Self {
        match scope {
            InstallScope::Global => Self {
                global: true,
                namespaces: BTreeSet::new(),
            },
            InstallScope::Namespaces(namespaces) => Self {
                global: false,
                namespaces,
            },
        }
    }
}

/// Installation state of one extension id.
///
/// A record exists only while the extension is installed somewhere; the
/// ledger drops it when the last membership is withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRecord {
    /// Descriptor captured at install time (artifact and dependency ids).
    pub descriptor: ExtensionDescriptor,
    scope: InstallScope,
    pub installed_at: DateTime<Utc>,
}

impl InstallationRecord {
    pub fn new(descriptor: ExtensionDescriptor, namespace: &Namespace) -> Self {
        Self {
            descriptor,
            scope: InstallScope::of(namespace),
            installed_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &ExtensionId {
        &self.descriptor.id
    }

    pub fn scope(&self) -> &InstallScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut InstallScope {
        &mut self.scope
    }

    /// Namespace-exact membership test, see [`InstallScope::contains`].
    pub fn is_installed(&self, namespace: &Namespace) -> bool {
        self.scope.contains(namespace)
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        self.scope.namespaces()
    }
}
