//! Resolved extension descriptors and their `extension.toml` manifest form.
//!
//! A descriptor is what the resolution layer hands to the lifecycle engine:
//! the extension id, the declared type that selects a handler, the backing
//! artifact and the dependency ids it needs at install time.
//!
//! # Example TOML
//!
//! ```toml
//! [extension]
//! name = "org.example:feature-with-deps"
//! version = "1.0"
//! type = "jar"
//! artifact = "feature-with-deps.jar"
//! features = ["feature-with-deps"]
//! exports = ["org.example.ComponentWithDeps"]
//!
//! [[dependencies]]
//! name = "org.example:feature"
//! version = "1.0"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::ExtensionId;

/// A resolved extension ready to be installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub id: ExtensionId,
    /// Declared type, used to select the handler (matched case-insensitively).
    #[serde(rename = "type")]
    pub extension_type: String,
    /// Backing artifact (archive path).
    pub artifact: PathBuf,
    /// Dependency ids in declaration order.
    #[serde(default)]
    pub dependencies: Vec<ExtensionId>,
    /// Version-less alternative ids this extension provides.
    #[serde(default)]
    pub features: Vec<String>,
    /// Symbols the artifact makes resolvable once loaded.
    #[serde(default)]
    pub exports: Vec<String>,
}

impl ExtensionDescriptor {
    pub fn new(
        id: ExtensionId,
        extension_type: impl Into<String>,
        artifact: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id,
            extension_type: extension_type.into(),
            artifact: artifact.into(),
            dependencies: Vec::new(),
            features: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Append a dependency; duplicates are ignored so declaration order is kept.
    pub fn with_dependency(mut self, dependency: ExtensionId) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn with_export(mut self, symbol: impl Into<String>) -> Self {
        self.exports.push(symbol.into());
        self
    }

    /// Whether this extension answers to `name`, either by id name or feature.
    pub fn provides(&self, name: &str) -> bool {
        self.id.name() == name || self.features.iter().any(|f| f == name)
    }

    /// Check the structural invariants of the descriptor.
    ///
    /// Dependencies must be unique and must not include the extension itself.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDescriptor {
            id: self.id.clone(),
            reason,
        };

        if self.extension_type.trim().is_empty() {
            return Err(invalid("type is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for dependency in &self.dependencies {
            if dependency == &self.id {
                return Err(invalid("extension depends on itself".to_string()));
            }
            if !seen.insert(dependency) {
                return Err(invalid(format!("duplicate dependency {dependency}")));
            }
        }

        Ok(())
    }

    /// Parse a descriptor from `extension.toml` content.
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: DescriptorManifest = toml::from_str(content)?;
        let descriptor = manifest.into_descriptor();
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Load a descriptor manifest from disk.
    ///
    /// A relative artifact path is resolved against the manifest's directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut descriptor = Self::from_toml(&content)?;
        if descriptor.artifact.is_relative() {
            if let Some(dir) = path.parent() {
                descriptor.artifact = dir.join(&descriptor.artifact);
            }
        }
        tracing::debug!(extension = %descriptor.id, ?path, "Loaded extension descriptor");
        Ok(descriptor)
    }
}

/// On-disk manifest layout.
#[derive(Debug, Deserialize)]
struct DescriptorManifest {
    extension: ManifestExtension,
    #[serde(default)]
    dependencies: Vec<ExtensionId>,
}

#[derive(Debug, Deserialize)]
struct ManifestExtension {
    name: String,
    version: String,
    #[serde(rename = "type")]
    extension_type: String,
    artifact: PathBuf,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    exports: Vec<String>,
}

impl DescriptorManifest {
    fn into_descriptor(self) -> ExtensionDescriptor {
        let ext = self.extension;
        ExtensionDescriptor {
            id: ExtensionId::new(ext.name, ext.version),
            extension_type: ext.extension_type,
            artifact: ext.artifact,
            dependencies: self.dependencies,
            features: ext.features,
            exports: ext.exports,
        }
    }
}
