//! Engine configuration parsed from TOML
//!
//! Every section is optional; an empty document yields an in-memory ledger,
//! unverified artifacts and no handler aliases.
//!
//! ```toml
//! [ledger]
//! path = "/var/lib/extensions/ledger.toml"
//!
//! [artifacts]
//! verify = true
//!
//! [handlers.aliases]
//! bundle = "jar"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Where installation records are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// TOML ledger file; absent means records live in memory only.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsSection {
    /// Refuse descriptors whose artifact file is missing.
    #[serde(default)]
    pub verify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlersSection {
    /// Extra type tags mapped to the type whose handler serves them.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Configuration for [`LifecycleEngine::from_config`](crate::LifecycleEngine::from_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ledger: LedgerSection,

    #[serde(default)]
    pub artifacts: ArtifactsSection,

    #[serde(default)]
    pub handlers: HandlersSection,
}

impl EngineConfig {
    /// Parse a configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if `path` does not exist, or a parse
    /// error if the content is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;

        // Relative ledger paths are taken relative to the configuration file.
        if let Some(ledger) = config.ledger.path.as_mut() {
            if ledger.is_relative() {
                if let Some(dir) = path.parent() {
                    *ledger = dir.join(&*ledger);
                }
            }
        }

        tracing::debug!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }
}
