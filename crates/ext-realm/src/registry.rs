//! Realm registry: sole owner of realm lifetimes.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ext_meta::Namespace;

use crate::error::{Error, Result};
use crate::realm::{Realm, RealmId};

/// Owns one realm per namespace plus the global realm.
///
/// Namespace realms are reference-counted. [`acquire`](Self::acquire) and
/// [`release`](Self::release) run under one lock, so a release that drops the
/// count to zero and tears the realm down can never interleave with an
/// acquire that would reuse it. The generation of a namespace only grows, so
/// a realm recreated after teardown always has a new [`RealmId`].
#[derive(Debug)]
pub struct RealmRegistry {
    global: Arc<Realm>,
    state: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    realms: HashMap<String, Slot>,
    /// Last generation handed out per namespace, kept across teardown.
    generations: HashMap<String, u64>,
    global_members: usize,
}

#[derive(Debug)]
struct Slot {
    realm: Arc<Realm>,
    members: usize,
}

impl RealmRegistry {
    /// Create a registry with its global realm.
    pub fn new() -> Self {
        let global = Realm::new(
            RealmId {
                namespace: Namespace::Global,
                generation: 0,
            },
            None,
        );
        Self {
            global: Arc::new(global),
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn global(&self) -> Arc<Realm> {
        self.global.clone()
    }

    /// Realm bound to `namespace`.
    ///
    /// The global namespace always yields the global realm. A realm created
    /// here has no members until [`acquire`](Self::acquire) is called for it.
    pub fn get(&self, namespace: &Namespace, create_if_absent: bool) -> Option<Arc<Realm>> {
        let Namespace::Named(name) = namespace else {
            return Some(self.global());
        };

        let mut state = self.state();
        if let Some(slot) = state.realms.get(name) {
            return Some(slot.realm.clone());
        }
        if !create_if_absent {
            return None;
        }
        Some(self.slot(&mut state, name).realm.clone())
    }

    /// Get or create the realm for `namespace` and count one more member.
    pub fn acquire(&self, namespace: &Namespace) -> Arc<Realm> {
        let mut state = self.state();
        let Namespace::Named(name) = namespace else {
            state.global_members += 1;
            return self.global();
        };

        let slot = self.slot(&mut state, name);
        slot.members += 1;
        tracing::debug!(
            realm = %slot.realm.id(),
            members = slot.members,
            "Acquired realm"
        );
        slot.realm.clone()
    }

    /// Acquire `namespace` for the lifetime of the returned lease.
    ///
    /// The lease keeps the realm alive while work is in flight. Dropping it
    /// releases the member again; [`RealmLease::keep`] turns it into a
    /// permanent member that a later [`release`](Self::release) balances.
    pub fn lease(&self, namespace: &Namespace) -> RealmLease<'_> {
        RealmLease {
            realm: self.acquire(namespace),
            registry: self,
            namespace: namespace.clone(),
            kept: false,
        }
    }

    /// Count one member less; destroys the realm when none remain.
    ///
    /// Returns the id of the destroyed realm, if any. The global realm is
    /// never destroyed.
    pub fn release(&self, namespace: &Namespace) -> Result<Option<RealmId>> {
        let mut state = self.state();
        let not_acquired = || Error::NotAcquired {
            namespace: namespace.clone(),
        };

        let Namespace::Named(name) = namespace else {
            state.global_members = state.global_members.checked_sub(1).ok_or_else(not_acquired)?;
            return Ok(None);
        };

        let slot = state
            .realms
            .get_mut(name)
            .filter(|slot| slot.members > 0)
            .ok_or_else(not_acquired)?;
        slot.members -= 1;
        if slot.members > 0 {
            return Ok(None);
        }

        let slot = state.realms.remove(name).ok_or_else(not_acquired)?;
        slot.realm.destroy();
        tracing::debug!(realm = %slot.realm.id(), "Destroyed realm");
        Ok(Some(slot.realm.id().clone()))
    }

    /// Number of members currently holding the realm of `namespace`.
    pub fn members(&self, namespace: &Namespace) -> usize {
        let state = self.state();
        match namespace {
            Namespace::Global => state.global_members,
            Namespace::Named(name) => state.realms.get(name).map_or(0, |slot| slot.members),
        }
    }

    /// Generation of the live realm for `namespace`, if one exists.
    pub fn generation(&self, namespace: &Namespace) -> Option<u64> {
        match namespace {
            Namespace::Global => Some(self.global.generation()),
            Namespace::Named(name) => self
                .state()
                .realms
                .get(name)
                .map(|slot| slot.realm.generation()),
        }
    }

    /// Names of namespaces with a live realm, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().realms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether no realm, global included, has any member.
    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.global_members == 0 && state.realms.values().all(|slot| slot.members == 0)
    }

    /// Slot for `name`, creating a realm with the next generation if absent.
    fn slot<'s>(&self, state: &'s mut RegistryState, name: &str) -> &'s mut Slot {
        match state.realms.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let generation = state.generations.entry(name.to_string()).or_insert(0);
                *generation += 1;
                let realm = Realm::new(
                    RealmId {
                        namespace: Namespace::named(name),
                        generation: *generation,
                    },
                    Some(self.global()),
                );
                tracing::debug!(realm = %realm.id(), "Created realm");
                entry.insert(Slot {
                    realm: Arc::new(realm),
                    members: 0,
                })
            }
        }
    }
}

/// Temporary realm member, see [`RealmRegistry::lease`].
#[derive(Debug)]
pub struct RealmLease<'r> {
    registry: &'r RealmRegistry,
    namespace: Namespace,
    realm: Arc<Realm>,
    kept: bool,
}

impl RealmLease<'_> {
    pub fn realm(&self) -> &Arc<Realm> {
        &self.realm
    }

    /// Keep the membership past the lease.
    pub fn keep(mut self) -> Arc<Realm> {
        self.kept = true;
        self.realm.clone()
    }
}

impl Drop for RealmLease<'_> {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(err) = self.registry.release(&self.namespace) {
            tracing::warn!(namespace = %self.namespace, error = %err, "Failed to release realm lease");
        }
    }
}

impl Default for RealmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ext_meta::ExtensionId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ns(name: &str) -> Namespace {
        Namespace::named(name)
    }

    #[test]
    fn global_namespace_returns_singleton() {
        let registry = RealmRegistry::new();
        let a = registry.get(&Namespace::Global, false).unwrap();
        let b = registry.get(&Namespace::Global, true).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.generation(), 0);
    }

    #[test]
    fn get_without_create_returns_none() {
        let registry = RealmRegistry::new();
        assert!(registry.get(&ns("ns1"), false).is_none());
        assert!(registry.get(&ns("ns1"), true).is_some());
        assert!(registry.get(&ns("ns1"), false).is_some());
    }

    #[test]
    fn namespace_realm_has_global_parent() {
        let registry = RealmRegistry::new();
        let realm = registry.acquire(&ns("ns1"));
        let parent = realm.parent().unwrap();
        assert!(Arc::ptr_eq(parent, &registry.global()));
    }

    #[test]
    fn release_to_zero_destroys_realm() {
        let registry = RealmRegistry::new();
        let realm = registry.acquire(&ns("ns1"));
        registry.acquire(&ns("ns1"));
        assert_eq!(registry.members(&ns("ns1")), 2);

        assert_eq!(registry.release(&ns("ns1")).unwrap(), None);
        assert!(!realm.is_destroyed());

        let destroyed = registry.release(&ns("ns1")).unwrap();
        assert_eq!(destroyed, Some(realm.id().clone()));
        assert!(realm.is_destroyed());
        assert!(registry.get(&ns("ns1"), false).is_none());
        assert!(registry.namespaces().is_empty());
    }

    #[test]
    fn recreated_realm_has_new_generation() {
        let registry = RealmRegistry::new();
        let first = registry.acquire(&ns("ns1"));
        registry.release(&ns("ns1")).unwrap();
        let second = registry.acquire(&ns("ns1"));

        assert_ne!(first.id(), second.id());
        assert_eq!(second.generation(), first.generation() + 1);
    }

    #[test]
    fn generations_are_per_namespace() {
        let registry = RealmRegistry::new();
        let a = registry.acquire(&ns("ns1"));
        let b = registry.acquire(&ns("ns2"));
        assert_eq!(a.generation(), 1);
        assert_eq!(b.generation(), 1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn global_realm_is_never_destroyed() {
        let registry = RealmRegistry::new();
        let global = registry.acquire(&Namespace::Global);
        global.define("T", &ExtensionId::new("a:dep", "1")).unwrap();
        registry.release(&Namespace::Global).unwrap();

        assert!(!global.is_destroyed());
        assert_eq!(registry.members(&Namespace::Global), 0);
        assert!(global.resolve("T").is_some());
    }

    #[rstest]
    #[case(Namespace::named("ns1"))]
    #[case(Namespace::Global)]
    fn unbalanced_release_fails(#[case] namespace: Namespace) {
        let registry = RealmRegistry::new();
        assert_eq!(
            registry.release(&namespace),
            Err(Error::NotAcquired { namespace })
        );
    }

    #[test]
    fn dropped_lease_releases_and_kept_lease_stays() {
        let registry = RealmRegistry::new();
        {
            let lease = registry.lease(&ns("ns1"));
            assert_eq!(registry.members(&ns("ns1")), 1);
            assert!(!lease.realm().is_destroyed());
        }
        assert!(registry.get(&ns("ns1"), false).is_none());

        let realm = registry.lease(&ns("ns1")).keep();
        assert_eq!(registry.members(&ns("ns1")), 1);
        assert_eq!(realm.generation(), 2);
    }

    #[test]
    fn idle_tracks_members() {
        let registry = RealmRegistry::new();
        assert!(registry.is_idle());
        registry.acquire(&ns("ns1"));
        assert!(!registry.is_idle());
        registry.release(&ns("ns1")).unwrap();
        assert!(registry.is_idle());
    }
}
