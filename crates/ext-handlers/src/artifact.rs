//! Built-in handler for archive artifacts.
//!
//! Loading an artifact means defining each of the descriptor's exports in the
//! target realm under the extension's id; unloading removes them again.

use async_trait::async_trait;
use ext_meta::{ExtensionDescriptor, Namespace};
use ext_realm::Realm;

use crate::error::HandlerError;
use crate::handler::ExtensionHandler;

/// Type tag served by [`ArtifactHandler`].
pub const ARTIFACT_TYPE: &str = "jar";

#[derive(Debug, Clone, Default)]
pub struct ArtifactHandler {
    verify: bool,
}

impl ArtifactHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse descriptors whose artifact file does not exist.
    pub fn verify_artifacts(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    fn check_artifact(&self, descriptor: &ExtensionDescriptor) -> Result<(), HandlerError> {
        if self.verify && !descriptor.artifact.is_file() {
            return Err(HandlerError::ArtifactMissing(descriptor.artifact.clone()));
        }
        Ok(())
    }

    /// Define every export, or none of them.
    fn load(&self, descriptor: &ExtensionDescriptor, realm: &Realm) -> Result<(), HandlerError> {
        self.check_artifact(descriptor)?;
        for symbol in &descriptor.exports {
            if let Err(err) = realm.define(symbol, &descriptor.id) {
                realm.unload(&descriptor.id);
                return Err(err.into());
            }
        }
        tracing::debug!(
            extension = %descriptor.id,
            realm = %realm.id(),
            exports = descriptor.exports.len(),
            "Loaded artifact"
        );
        Ok(())
    }
}

#[async_trait]
impl ExtensionHandler for ArtifactHandler {
    fn extension_type(&self) -> &str {
        ARTIFACT_TYPE
    }

    async fn install(
        &self,
        descriptor: &ExtensionDescriptor,
        _namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.load(descriptor, realm)
    }

    async fn uninstall(
        &self,
        descriptor: &ExtensionDescriptor,
        _namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        let removed = realm.unload(&descriptor.id);
        tracing::debug!(
            extension = %descriptor.id,
            realm = %realm.id(),
            removed = removed.len(),
            "Unloaded artifact"
        );
        Ok(())
    }

    async fn upgrade(
        &self,
        previous: &ExtensionDescriptor,
        new: &ExtensionDescriptor,
        _namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.check_artifact(new)?;
        realm.unload(&previous.id);
        if let Err(err) = self.load(new, realm) {
            // Put the previous version back so a failed upgrade is invisible.
            for symbol in &previous.exports {
                if let Err(restore) = realm.define(symbol, &previous.id) {
                    tracing::warn!(
                        extension = %previous.id,
                        symbol = %symbol,
                        error = %restore,
                        "Failed to restore export after upgrade failure"
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }

    async fn initialize(
        &self,
        descriptor: &ExtensionDescriptor,
        _namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.load(descriptor, realm)
    }
}
