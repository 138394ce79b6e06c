//! Installation namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Isolation domain an extension is installed into.
///
/// [`Namespace::Global`] stands for "no namespace restriction": it is the
/// absence of a namespace rather than a reserved name, and serializes as a
/// missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Namespace {
    #[default]
    Global,
    Named(String),
}

impl Namespace {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// The namespace name, or `None` for the global namespace.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("<global>"),
            Self::Named(name) => write!(f, "namespace [{name}]"),
        }
    }
}

impl From<Option<String>> for Namespace {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Global, Self::Named)
    }
}

impl From<Option<&str>> for Namespace {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Global, Self::named)
    }
}

impl From<Namespace> for Option<String> {
    fn from(value: Namespace) -> Self {
        match value {
            Namespace::Global => None,
            Namespace::Named(name) => Some(name),
        }
    }
}
