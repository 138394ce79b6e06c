//! Realm: an isolated, generation-stamped symbol table.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use ext_meta::{ExtensionId, Namespace};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Value identity of a realm: its namespace and the generation it was
/// created with. A realm recreated after teardown never reuses an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealmId {
    pub namespace: Namespace,
    pub generation: u64,
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.namespace, self.generation)
    }
}

/// A symbol loaded into a realm.
///
/// Each definition gets a fresh `instance`, so loading the same export again
/// (after an uninstall, or in another realm) yields an unequal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadedSymbol {
    pub name: String,
    pub provider: ExtensionId,
    pub realm: RealmId,
    pub instance: Uuid,
}

#[derive(Debug)]
struct Entry {
    symbol: LoadedSymbol,
    published: bool,
}

#[derive(Debug, Default)]
struct Symbols {
    entries: HashMap<String, Entry>,
    /// Providers whose definitions stay hidden until published.
    staging: HashSet<ExtensionId>,
}

/// Isolated loading context bound to one namespace or to the global scope.
#[derive(Debug)]
pub struct Realm {
    id: RealmId,
    parent: Option<Arc<Realm>>,
    symbols: RwLock<Symbols>,
    destroyed: AtomicBool,
}

impl Realm {
    pub(crate) fn new(id: RealmId, parent: Option<Arc<Realm>>) -> Self {
        Self {
            id,
            parent,
            symbols: RwLock::new(Symbols::default()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &RealmId {
        &self.id
    }

    pub fn namespace(&self) -> &Namespace {
        &self.id.namespace
    }

    pub fn generation(&self) -> u64 {
        self.id.generation
    }

    /// Fallback realm consulted when a symbol is not defined locally.
    pub fn parent(&self) -> Option<&Arc<Realm>> {
        self.parent.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Load `name` into this realm on behalf of `provider`.
    ///
    /// Redefining a symbol the same provider already owns replaces it with a
    /// new instance. While `provider` is staged the symbol is held back from
    /// resolution until [`StagedLoad::publish`].
    pub fn define(&self, name: &str, provider: &ExtensionId) -> Result<LoadedSymbol> {
        let mut symbols = self.symbols.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_destroyed() {
            return Err(Error::Destroyed {
                realm: self.id.clone(),
            });
        }
        if let Some(existing) = symbols.entries.get(name) {
            if &existing.symbol.provider != provider {
                return Err(Error::SymbolConflict {
                    symbol: name.to_string(),
                    realm: self.id.clone(),
                    provider: existing.symbol.provider.clone(),
                });
            }
        }

        let symbol = LoadedSymbol {
            name: name.to_string(),
            provider: provider.clone(),
            realm: self.id.clone(),
            instance: Uuid::new_v4(),
        };
        let published = !symbols.staging.contains(provider);
        symbols.entries.insert(
            name.to_string(),
            Entry {
                symbol: symbol.clone(),
                published,
            },
        );
        Ok(symbol)
    }

    /// Hold back every definition `provider` makes here until the returned
    /// guard is published. Dropping the guard unpublished discards them.
    pub fn stage(self: &Arc<Self>, provider: &ExtensionId) -> StagedLoad {
        self.symbols
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .staging
            .insert(provider.clone());
        StagedLoad {
            realm: self.clone(),
            provider: provider.clone(),
            published: false,
        }
    }

    /// Drop every symbol `provider` defined here; returns the removed names.
    pub fn unload(&self, provider: &ExtensionId) -> Vec<String> {
        let mut symbols = self.symbols.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed: Vec<String> = symbols
            .entries
            .iter()
            .filter(|(_, entry)| &entry.symbol.provider == provider)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &removed {
            symbols.entries.remove(name);
        }
        removed.sort();
        removed
    }

    /// Resolve `name` locally, then through the parent chain.
    pub fn resolve(&self, name: &str) -> Option<LoadedSymbol> {
        if self.is_destroyed() {
            return None;
        }
        self.resolve_local(name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.resolve(name)))
    }

    /// Resolve `name` in this realm only.
    pub fn resolve_local(&self, name: &str) -> Option<LoadedSymbol> {
        if self.is_destroyed() {
            return None;
        }
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(name)
            .filter(|entry| entry.published)
            .map(|entry| entry.symbol.clone())
    }

    /// Published local symbols, sorted by name.
    pub fn symbols(&self) -> Vec<LoadedSymbol> {
        let mut symbols: Vec<LoadedSymbol> = self
            .symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .values()
            .filter(|entry| entry.published)
            .map(|entry| entry.symbol.clone())
            .collect();
        symbols.sort_by(|a, b| a.name.cmp(&b.name));
        symbols
    }

    /// Release everything loaded here. Later definitions fail.
    pub(crate) fn destroy(&self) {
        let mut symbols = self.symbols.write().unwrap_or_else(PoisonError::into_inner);
        self.destroyed.store(true, Ordering::Release);
        symbols.entries.clear();
        symbols.staging.clear();
    }

    fn finish_staging(&self, provider: &ExtensionId, publish: bool) {
        let mut symbols = self.symbols.write().unwrap_or_else(PoisonError::into_inner);
        symbols.staging.remove(provider);
        if publish {
            for entry in symbols.entries.values_mut() {
                if &entry.symbol.provider == provider {
                    entry.published = true;
                }
            }
        } else {
            symbols
                .entries
                .retain(|_, entry| entry.published || &entry.symbol.provider != provider);
        }
    }
}

/// Definitions of one provider held back from resolution, see [`Realm::stage`].
#[derive(Debug)]
pub struct StagedLoad {
    realm: Arc<Realm>,
    provider: ExtensionId,
    published: bool,
}

impl StagedLoad {
    /// Make the staged definitions resolvable.
    pub fn publish(mut self) {
        self.published = true;
        self.realm.finish_staging(&self.provider, true);
    }
}

impl Drop for StagedLoad {
    fn drop(&mut self) {
        if !self.published {
            self.realm.finish_staging(&self.provider, false);
        }
    }
}
