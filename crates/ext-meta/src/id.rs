//! Extension identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Immutable `(name, version)` pair identifying one extension build.
///
/// Two ids are equal only when both the name and the version match. The
/// textual form is `name/version`; the name may contain any character except
/// that the last `/` separates the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtensionId {
    name: String,
    version: String,
}

impl ExtensionId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl FromStr for ExtensionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidId {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (name, version) = s
            .rsplit_once('/')
            .ok_or_else(|| invalid("expected 'name/version'"))?;
        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if version.trim().is_empty() {
            return Err(invalid("version is empty"));
        }
        Ok(Self::new(name, version))
    }
}
