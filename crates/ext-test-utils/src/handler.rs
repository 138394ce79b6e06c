//! [`ScriptedHandler`]: a handler that records calls and fails on demand.
//!
//! Loading is delegated to the built-in artifact handler, so extensions
//! served by it define real symbols in their realm.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ext_handlers::{ArtifactHandler, ExtensionHandler, HandlerError, InstallError, UninstallError};
use ext_meta::{ExtensionDescriptor, ExtensionId, Namespace, NotInstalledError};
use ext_realm::{Realm, RealmId};

/// Type tag served by [`ScriptedHandler`].
pub const SCRIPTED_TYPE: &str = "scripted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
    Upgrade,
    Initialize,
}

/// One recorded handler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub extension: ExtensionId,
    pub namespace: Namespace,
    pub realm: RealmId,
}

/// Error a scripted failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Plain handler failure, wrapped by the dispatcher.
    Generic,
    /// An [`InstallError`] raised by the handler itself.
    Install,
    /// An [`UninstallError`] raised by the handler itself.
    Uninstall,
}

#[derive(Debug, Clone)]
struct Failure {
    operation: Operation,
    namespace: Option<Namespace>,
    kind: FailureKind,
}

#[derive(Debug, Default)]
pub struct ScriptedHandler {
    inner: ArtifactHandler,
    delay: Option<Duration>,
    failures: Mutex<Vec<Failure>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call, widening race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every `operation` call.
    pub fn fail(&self, operation: Operation) {
        self.push_failure(operation, None, FailureKind::Generic);
    }

    /// Fail `operation` calls in `namespace` only.
    pub fn fail_in(&self, operation: Operation, namespace: Namespace) {
        self.push_failure(operation, Some(namespace), FailureKind::Generic);
    }

    /// Fail every `operation` call with an error of the given kind.
    pub fn fail_with(&self, operation: Operation, kind: FailureKind) {
        self.push_failure(operation, None, kind);
    }

    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_for(&self, operation: Operation) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == operation)
            .collect()
    }

    fn push_failure(&self, operation: Operation, namespace: Option<Namespace>, kind: FailureKind) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Failure {
                operation,
                namespace,
                kind,
            });
    }

    async fn enter(
        &self,
        operation: Operation,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                operation,
                extension: descriptor.id.clone(),
                namespace: namespace.clone(),
                realm: realm.id().clone(),
            });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|failure| {
                failure.operation == operation
                    && failure.namespace.as_ref().is_none_or(|ns| ns == namespace)
            })
            .map(|failure| failure.kind);

        match failure {
            None => Ok(()),
            Some(FailureKind::Generic) => Err(HandlerError::failed(format!(
                "scripted {operation:?} failure for {}",
                descriptor.id
            ))),
            Some(FailureKind::Install) => Err(InstallError::UnresolvedDependency {
                id: descriptor.id.clone(),
                dependency: ExtensionId::new("scripted:missing", "0"),
                namespace: namespace.clone(),
            }
            .into()),
            Some(FailureKind::Uninstall) => Err(UninstallError::NotInstalled(NotInstalledError {
                id: descriptor.id.clone(),
                namespace: namespace.clone(),
            })
            .into()),
        }
    }
}

#[async_trait]
impl ExtensionHandler for ScriptedHandler {
    fn extension_type(&self) -> &str {
        SCRIPTED_TYPE
    }

    async fn install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.enter(Operation::Install, descriptor, namespace, realm)
            .await?;
        self.inner.install(descriptor, namespace, realm).await
    }

    async fn uninstall(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.enter(Operation::Uninstall, descriptor, namespace, realm)
            .await?;
        self.inner.uninstall(descriptor, namespace, realm).await
    }

    async fn upgrade(
        &self,
        previous: &ExtensionDescriptor,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.enter(Operation::Upgrade, new, namespace, realm).await?;
        self.inner.upgrade(previous, new, namespace, realm).await
    }

    async fn initialize(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) -> Result<(), HandlerError> {
        self.enter(Operation::Initialize, descriptor, namespace, realm)
            .await?;
        self.inner.initialize(descriptor, namespace, realm).await
    }
}
