//! Extension lifecycle engine
//!
//! Orchestrates install, uninstall and upgrade over the realm registry and
//! the installation ledger. The engine keeps no state of its own beyond the
//! per-key operation locks: the ledger owns the records and the registry
//! owns the realms.
//!
//! Each operation resolves its handler, takes the lock for its
//! `(extension, namespace)` key, checks the ledger, pins the target realm,
//! runs the handler and only then writes the ledger. A failure at any step
//! leaves the ledger as it was. Symbols an install defines stay staged until
//! the ledger write succeeds.
//!
//! Realm memberships mirror the ledger. An engine opened over a ledger that
//! already holds records loads them into fresh realms before its first
//! operation, or when [`LifecycleEngine::initialize_all`] is called.

use std::sync::Arc;

use ext_handlers::{
    ArtifactHandler, BoundHandler, HandlerDispatcher, InstallError, UninstallError,
};
use ext_meta::{
    ExtensionDescriptor, ExtensionId, InstallationLedger, InstallationRecord, LedgerError,
    Namespace, NotInstalledError,
};
use ext_realm::{ContextActivator, Realm, RealmLease, RealmRegistry};
use tokio::sync::OnceCell;

use crate::config::EngineConfig;
use crate::ledger::{MemoryLedger, TomlLedger};
use crate::locks::OperationLocks;
use crate::{Error, Result};

pub struct LifecycleEngine {
    dispatcher: HandlerDispatcher,
    ledger: Arc<dyn InstallationLedger>,
    registry: Arc<RealmRegistry>,
    locks: OperationLocks,
    /// Number of recorded memberships loaded at startup, once loaded.
    initialized: OnceCell<usize>,
}

impl LifecycleEngine {
    pub fn new(dispatcher: HandlerDispatcher, ledger: Arc<dyn InstallationLedger>) -> Self {
        Self::with_registry(dispatcher, ledger, Arc::new(RealmRegistry::new()))
    }

    /// Create an engine over an existing realm registry.
    pub fn with_registry(
        dispatcher: HandlerDispatcher,
        ledger: Arc<dyn InstallationLedger>,
        registry: Arc<RealmRegistry>,
    ) -> Self {
        Self {
            dispatcher,
            ledger,
            registry,
            locks: OperationLocks::new(),
            initialized: OnceCell::new(),
        }
    }

    /// Build the dispatcher, ledger and registry described by `config`.
    ///
    /// Aliases pointing at an unknown type are skipped with a warning.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut dispatcher = HandlerDispatcher::new();
        dispatcher.register(Arc::new(
            ArtifactHandler::new().verify_artifacts(config.artifacts.verify),
        ));
        for (alias, target) in &config.handlers.aliases {
            if !dispatcher.alias(alias, target) {
                tracing::warn!(alias = %alias, target = %target, "Skipping alias for unknown extension type");
            }
        }

        let ledger: Arc<dyn InstallationLedger> = match &config.ledger.path {
            Some(path) => Arc::new(TomlLedger::open(path)?),
            None => Arc::new(MemoryLedger::new()),
        };
        Ok(Self::new(dispatcher, ledger))
    }

    pub fn dispatcher(&self) -> &HandlerDispatcher {
        &self.dispatcher
    }

    pub fn ledger(&self) -> &Arc<dyn InstallationLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<RealmRegistry> {
        &self.registry
    }

    /// Context activation hook bound to this engine's realms.
    pub fn activator(&self) -> ContextActivator {
        ContextActivator::new(self.registry.clone())
    }

    /// Install `descriptor` into `namespace`.
    ///
    /// Every declared dependency must be installed in `namespace` or
    /// globally. The extension becomes resolvable from the target realm only
    /// after its record is written; a failed or cancelled install leaves
    /// neither a record nor symbols behind.
    pub async fn install(
        &self,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> std::result::Result<InstallationRecord, InstallError> {
        let handler = self.dispatcher.handler_for(descriptor)?;
        descriptor.validate()?;
        self.ensure_initialized().await?;

        let _guard = self.locks.lock(&descriptor.id, namespace).await;

        if let Some(record) = self.ledger.resolve(&descriptor.id)? {
            record.scope().clone().admit(&descriptor.id, namespace)?;
        }
        for dependency in &descriptor.dependencies {
            if self.dependency_scope(dependency, namespace)?.is_none() {
                return Err(InstallError::UnresolvedDependency {
                    id: descriptor.id.clone(),
                    dependency: dependency.clone(),
                    namespace: namespace.clone(),
                });
            }
        }

        let lease = self.registry.lease(namespace);
        let staged = lease.realm().stage(&descriptor.id);
        handler.install(descriptor, namespace, lease.realm()).await?;

        let record = match self.ledger.record_install(descriptor, namespace) {
            Ok(record) => record,
            Err(err) => {
                self.unload_quietly(&handler, descriptor, namespace, lease.realm())
                    .await;
                return Err(err.into());
            }
        };

        staged.publish();
        let realm = lease.keep();
        tracing::info!(
            extension = %descriptor.id,
            namespace = %namespace,
            realm = %realm.id(),
            "Installed extension"
        );
        Ok(record)
    }

    /// Uninstall `extension` from `namespace`.
    ///
    /// [`Namespace::Global`] uninstalls it from everywhere it is installed.
    /// Dependents are left installed; their dependency simply stops
    /// resolving.
    pub async fn uninstall(
        &self,
        extension: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> std::result::Result<(), UninstallError> {
        let handler = self.dispatcher.handler_for(extension)?;
        self.ensure_initialized()
            .await
            .map_err(|err| UninstallError::Initialize(Box::new(err)))?;

        let _guard = self.locks.lock(&extension.id, namespace).await;

        let record = self
            .ledger
            .resolve(&extension.id)?
            .filter(|record| namespace.is_global() || record.is_installed(namespace))
            .ok_or_else(|| NotInstalledError {
                id: extension.id.clone(),
                namespace: namespace.clone(),
            })?;
        let memberships = match namespace {
            Namespace::Global => record.namespaces(),
            Namespace::Named(_) => vec![namespace.clone()],
        };

        let mut unloaded: Vec<(Namespace, RealmLease<'_>)> = Vec::with_capacity(memberships.len());
        for member in memberships {
            let lease = self.registry.lease(&member);
            if let Err(err) = handler
                .uninstall(&record.descriptor, &member, lease.realm())
                .await
            {
                self.reload(&handler, &record.descriptor, &unloaded).await;
                return Err(err);
            }
            unloaded.push((member, lease));
        }

        let removed = match self.ledger.record_uninstall(&extension.id, namespace) {
            Ok(removed) => removed,
            Err(err) => {
                self.reload(&handler, &record.descriptor, &unloaded).await;
                return Err(err.into());
            }
        };
        for member in &removed {
            if let Err(err) = self.registry.release(member) {
                tracing::warn!(namespace = %member, error = %err, "Realm membership was not held");
            }
        }
        drop(unloaded);

        tracing::info!(
            extension = %extension.id,
            namespace = %namespace,
            removed = removed.len(),
            "Uninstalled extension"
        );
        Ok(())
    }

    /// Replace `previous` with `new` in `namespace` without a gap.
    ///
    /// The handler is chosen by the previous extension's type. The realm is
    /// reused, so the namespace keeps its realm identity.
    pub async fn upgrade(
        &self,
        previous: &ExtensionDescriptor,
        new: &ExtensionDescriptor,
        namespace: &Namespace,
    ) -> std::result::Result<InstallationRecord, InstallError> {
        let handler = self.dispatcher.handler_for(previous)?;
        new.validate()?;
        self.ensure_initialized().await?;

        let _guards = self
            .locks
            .lock_all(&[(&previous.id, namespace), (&new.id, namespace)])
            .await;

        if !self.ledger.is_installed(&previous.id, namespace)? {
            return Err(NotInstalledError {
                id: previous.id.clone(),
                namespace: namespace.clone(),
            }
            .into());
        }
        if previous.id != new.id {
            if let Some(record) = self.ledger.resolve(&new.id)? {
                record.scope().clone().admit(&new.id, namespace)?;
            }
        }

        let lease = self.registry.lease(namespace);
        handler
            .upgrade(previous, new, namespace, lease.realm())
            .await?;

        match self.ledger.record_upgrade(&previous.id, new, namespace) {
            Ok(record) => {
                tracing::info!(
                    extension = %previous.id,
                    version = %new.id.version(),
                    namespace = %namespace,
                    "Upgraded extension"
                );
                Ok(record)
            }
            Err(err) => {
                if let Err(restore) = handler
                    .upgrade(new, previous, namespace, lease.realm())
                    .await
                {
                    tracing::warn!(
                        extension = %previous.id,
                        namespace = %namespace,
                        error = %restore,
                        "Failed to restore previous version after ledger failure"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Re-establish the realms of every recorded installation.
    ///
    /// Meant for startup over a persisted ledger; returns the number of
    /// memberships initialized. Operations run it on first use when the host
    /// has not, so an explicit call after that reports
    /// [`Error::AlreadyInitialized`].
    pub async fn initialize_all(&self) -> Result<usize> {
        let mut ran = false;
        let initialized = self
            .initialized
            .get_or_try_init(|| {
                ran = true;
                self.load_recorded()
            })
            .await?;
        if !ran {
            return Err(Error::AlreadyInitialized);
        }
        Ok(*initialized)
    }

    /// Whether `id` is available in `namespace`.
    ///
    /// A global install counts for every namespace; a [`Namespace::Global`]
    /// query only matches global installs.
    pub fn is_installed(
        &self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> std::result::Result<bool, LedgerError> {
        Ok(self.get_installed_extension(id, namespace)?.is_some())
    }

    /// Record of `id` if it is available in `namespace`, see [`Self::is_installed`].
    pub fn get_installed_extension(
        &self,
        id: &ExtensionId,
        namespace: &Namespace,
    ) -> std::result::Result<Option<InstallationRecord>, LedgerError> {
        Ok(self.ledger.resolve(id)?.filter(|record| {
            record.is_installed(namespace) || record.is_installed(&Namespace::Global)
        }))
    }

    /// Record providing `feature` (an id name or a declared feature) in `namespace`.
    pub fn get_installed_feature(
        &self,
        feature: &str,
        namespace: &Namespace,
    ) -> std::result::Result<Option<InstallationRecord>, LedgerError> {
        if let Some(record) = self.ledger.installed_by_feature(feature, namespace)? {
            return Ok(Some(record));
        }
        match namespace {
            Namespace::Global => Ok(None),
            Namespace::Named(_) => self
                .ledger
                .installed_by_feature(feature, &Namespace::Global),
        }
    }

    /// Every installation record, ordered by extension id.
    pub fn installed_extensions(
        &self,
    ) -> std::result::Result<Vec<InstallationRecord>, LedgerError> {
        self.ledger.records()
    }

    /// Realm a dependency of an extension in `namespace` resolves through.
    ///
    /// The namespace's own install wins over a global one. `None` means the
    /// dependency is unresolved.
    pub fn resolve_dependency(
        &self,
        dependency: &ExtensionId,
        namespace: &Namespace,
    ) -> std::result::Result<Option<Arc<Realm>>, LedgerError> {
        Ok(self
            .dependency_scope(dependency, namespace)?
            .and_then(|scope| self.registry.get(&scope, false)))
    }

    fn dependency_scope(
        &self,
        dependency: &ExtensionId,
        namespace: &Namespace,
    ) -> std::result::Result<Option<Namespace>, LedgerError> {
        if self.ledger.is_installed(dependency, namespace)? {
            Ok(Some(namespace.clone()))
        } else if self.ledger.is_installed(dependency, &Namespace::Global)? {
            Ok(Some(Namespace::Global))
        } else {
            Ok(None)
        }
    }

    async fn ensure_initialized(&self) -> std::result::Result<(), InstallError> {
        self.initialized
            .get_or_try_init(|| self.load_recorded())
            .await
            .map(|_| ())
    }

    /// Load every recorded membership into its realm.
    ///
    /// All or nothing: on failure the memberships loaded so far are unloaded
    /// and released again, so a later attempt starts from idle realms.
    async fn load_recorded(&self) -> std::result::Result<usize, InstallError> {
        let records = self.ledger.records()?;
        let mut loaded: Vec<(BoundHandler, &InstallationRecord, Namespace, RealmLease<'_>)> =
            Vec::new();

        for record in &records {
            let handler = match self.dispatcher.handler_for(&record.descriptor) {
                Ok(handler) => handler,
                Err(err) => {
                    self.unload_all(loaded).await;
                    return Err(err.into());
                }
            };
            for namespace in record.namespaces() {
                let _guard = self.locks.lock(record.id(), &namespace).await;
                let lease = self.registry.lease(&namespace);
                if let Err(err) = handler
                    .initialize(&record.descriptor, &namespace, lease.realm())
                    .await
                {
                    self.unload_all(loaded).await;
                    return Err(err);
                }
                loaded.push((handler.clone(), record, namespace, lease));
            }
        }

        let initialized = loaded.len();
        for (_, _, _, lease) in loaded {
            lease.keep();
        }
        tracing::info!(initialized, "Initialized installed extensions");
        Ok(initialized)
    }

    async fn unload_all(
        &self,
        loaded: Vec<(BoundHandler, &InstallationRecord, Namespace, RealmLease<'_>)>,
    ) {
        for (handler, record, namespace, lease) in loaded {
            self.unload_quietly(&handler, &record.descriptor, &namespace, lease.realm())
                .await;
        }
    }

    /// Undo a handler install or initialize that can't be kept.
    async fn unload_quietly(
        &self,
        handler: &BoundHandler,
        descriptor: &ExtensionDescriptor,
        namespace: &Namespace,
        realm: &Realm,
    ) {
        if let Err(err) = handler.uninstall(descriptor, namespace, realm).await {
            tracing::warn!(
                extension = %descriptor.id,
                namespace = %namespace,
                error = %err,
                "Failed to unload extension during rollback"
            );
        }
    }

    /// Load `descriptor` back into realms it was already unloaded from.
    async fn reload(
        &self,
        handler: &BoundHandler,
        descriptor: &ExtensionDescriptor,
        unloaded: &[(Namespace, RealmLease<'_>)],
    ) {
        for (namespace, lease) in unloaded {
            tracing::warn!(extension = %descriptor.id, namespace = %namespace, "Reloading after failed uninstall");
            if let Err(err) = handler.initialize(descriptor, namespace, lease.realm()).await {
                tracing::warn!(
                    extension = %descriptor.id,
                    namespace = %namespace,
                    error = %err,
                    "Failed to reload extension"
                );
            }
        }
    }
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("dispatcher", &self.dispatcher)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
