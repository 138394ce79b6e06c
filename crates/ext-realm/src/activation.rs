//! Context activation: switch a unit of work to its namespace's realm.
//!
//! The host hands an [`ExecutionContext`] to [`ContextActivator::activate`]
//! when a namespace-scoped unit of work starts. The returned [`ActiveRealm`]
//! guard restores the previous realm when it is dropped, so activations nest
//! like scopes.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use ext_meta::Namespace;

use crate::realm::Realm;
use crate::registry::RealmRegistry;

/// Per unit-of-work state: the namespace it runs in and the realm code is
/// currently resolved through. No active realm means the host's own code.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    namespace: Namespace,
    active: Option<Arc<Realm>>,
}

impl ExecutionContext {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            active: None,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn active_realm(&self) -> Option<&Arc<Realm>> {
        self.active.as_ref()
    }
}

/// Switches execution contexts to the realm of their namespace.
#[derive(Debug, Clone)]
pub struct ContextActivator {
    registry: Arc<RealmRegistry>,
}

impl ContextActivator {
    pub fn new(registry: Arc<RealmRegistry>) -> Self {
        Self { registry }
    }

    /// Realm a context declared in `namespace` resolves through: the
    /// namespace realm if one is live, the global realm otherwise.
    pub fn realm_for(&self, namespace: &Namespace) -> Arc<Realm> {
        self.registry
            .get(namespace, false)
            .unwrap_or_else(|| self.registry.global())
    }

    /// Activate the realm for the context's own namespace.
    pub fn activate<'a>(&self, context: &'a mut ExecutionContext) -> ActiveRealm<'a> {
        let namespace = context.namespace.clone();
        self.enter(context, namespace)
    }

    /// Move the context into `namespace` and activate its realm until the
    /// guard is dropped.
    pub fn enter<'a>(
        &self,
        context: &'a mut ExecutionContext,
        namespace: Namespace,
    ) -> ActiveRealm<'a> {
        let realm = self.realm_for(&namespace);
        tracing::trace!(%namespace, realm = %realm.id(), "Activating realm");

        let previous_namespace = std::mem::replace(&mut context.namespace, namespace);
        let previous_realm = context.active.replace(realm.clone());
        ActiveRealm {
            context,
            realm,
            previous_namespace,
            previous_realm,
        }
    }
}

/// Scoped activation; restores the previous namespace and realm on drop.
#[derive(Debug)]
pub struct ActiveRealm<'a> {
    context: &'a mut ExecutionContext,
    realm: Arc<Realm>,
    previous_namespace: Namespace,
    previous_realm: Option<Arc<Realm>>,
}

impl ActiveRealm<'_> {
    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }
}

impl Deref for ActiveRealm<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        &*self.context
    }
}

impl DerefMut for ActiveRealm<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.context
    }
}

impl Drop for ActiveRealm<'_> {
    fn drop(&mut self) {
        self.context.active = self.previous_realm.take();
        self.context.namespace = std::mem::take(&mut self.previous_namespace);
    }
}
