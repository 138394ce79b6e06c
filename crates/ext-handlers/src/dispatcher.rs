//! Handler dispatcher that routes extensions to the handler of their type.
//!
//! Handlers are registered once at startup under a lower-cased type tag.
//! Lookup is case-insensitive and fails closed with [`NoHandlerFoundError`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ext_meta::{ExtensionDescriptor, Namespace};
use ext_realm::Realm;

use crate::artifact::ArtifactHandler;
use crate::error::{HandlerError, InstallError, NoHandlerFoundError, UninstallError};
use crate::handler::ExtensionHandler;

/// Maps extension types to their handlers.
#[derive(Clone, Default)]
pub struct HandlerDispatcher {
    handlers: HashMap<String, Arc<dyn ExtensionHandler>>,
}

impl HandlerDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher with the built-in artifact handler.
    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Arc::new(ArtifactHandler::new()));
        dispatcher
    }

    /// Register a handler under its own type tag, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ExtensionHandler>) {
        let key = handler.extension_type().to_lowercase();
        self.register_as(&key, handler);
    }

    /// Register a handler under an explicit type tag.
    pub fn register_as(&mut self, extension_type: &str, handler: Arc<dyn ExtensionHandler>) {
        tracing::debug!(extension_type, "Registered extension handler");
        self.handlers.insert(extension_type.to_lowercase(), handler);
    }

    /// Route `alias` to the handler already registered for `target`.
    ///
    /// Returns `false` when `target` has no handler.
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        match self.handlers.get(&target.to_lowercase()).cloned() {
            Some(handler) => {
                self.register_as(alias, handler);
                true
            }
            None => false,
        }
    }

    /// Check if a handler is registered for `extension_type`.
    pub fn has_handler(&self, extension_type: &str) -> bool {
        self.handlers.contains_key(&extension_type.to_lowercase())
    }

    /// List registered type tags (sorted).
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        types.sort();
        types
    }

    /// Handler for the descriptor's declared type.
    pub fn handler_for(
        &self,
        descriptor: &ExtensionDescriptor,
    ) -> Result<BoundHandler, NoHandlerFoundError> {
        self.handlers
            .get(&descriptor.extension_type.to_lowercase())
            .map(|handler| BoundHandler {
                handler: handler.clone(),
            })
            .ok_or_else(|| NoHandlerFoundError {
                id: descriptor.id.clone(),
                extension_type: descriptor.extension_type.clone(),
            })
    }
}

impl fmt::Debug for HandlerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDispatcher")
            .field("types", &self.types())
            .finish()
    }
}

/// A resolved handler whose calls return operation-level errors.
///
/// Install failures are always wrapped in [`InstallError`] and initialize
/// failures in [`InstallError::InitializeFailed`]. Uninstall passes a
/// handler-raised [`UninstallError`] through unchanged; upgrade does the same
/// for [`InstallError`].
#[derive(Clone)]
pub struct BoundHandler {
    handler: Arc<dyn ExtensionHandler>,
}

impl BoundHandler {
    pub fn extension_type(&self) -> &str {
        self.handler.extension_type()
    }

    pub fn handler(&self) -> &Arc<dyn ExtensionHandler> {
        &self.handler
    }

    pub async fn install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), InstallError> {
        self.handler
            .install(descriptor, namespace, realm)
            .await
            .map_err(|source| InstallError::Handler {
                id: descriptor.id.clone(),
                namespace: namespace.clone(),
                source,
            })
    }

    pub async fn uninstall(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), UninstallError> {
        self.handler
            .uninstall(descriptor, namespace, realm)
            .await
            .map_err(|err| match err {
                HandlerError::Uninstall(err) => *err,
                source => UninstallError::Handler {
                    id: descriptor.id.clone(),
                    namespace: namespace.clone(),
                    source,
                },
            })
    }

    pub async fn upgrade(
        &self,
        previous: &ExtensionDescriptor,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), InstallError> {
        self.handler
            .upgrade(previous, new, namespace, realm)
            .await
            .map_err(|err| match err {
                HandlerError::Install(err) => *err,
                source => InstallError::Handler {
                    id: new.id.clone(),
                    namespace: namespace.clone(),
                    source,
                },
            })
    }

    pub async fn initialize(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), InstallError> {
        self.handler
            .initialize(descriptor, namespace, realm)
            .await
            .map_err(|source| InstallError::InitializeFailed {
                id: descriptor.id.clone(),
                namespace: namespace.clone(),
                source,
            })
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("extension_type", &self.extension_type())
            .finish()
    }
}
