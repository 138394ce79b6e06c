//! [`TestEngine`] harness.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ext_core::{LifecycleEngine, MemoryLedger, TomlLedger};
use ext_handlers::HandlerDispatcher;
use ext_meta::{InstallationLedger, Namespace};
use ext_realm::{ExecutionContext, LoadedSymbol};
use tempfile::TempDir;

use crate::handler::ScriptedHandler;

/// A lifecycle engine with the built-in handlers plus a shared
/// [`ScriptedHandler`]. Dereferences to the engine.
///
/// # Example
///
/// ```rust,no_run
/// use ext_test_utils::{TestEngine, jar, ns};
///
/// # async fn example() {
/// let harness = TestEngine::new();
/// harness.install(&jar("a:pkg"), &ns("ns1")).await.unwrap();
/// assert!(harness.resolve_symbol("a.pkg.Component", &ns("ns1")).is_some());
/// # }
/// ```
pub struct TestEngine {
    engine: LifecycleEngine,
    handler: Arc<ScriptedHandler>,
    dir: Option<Arc<TempDir>>,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine {
    /// Engine over an in-memory ledger.
    pub fn new() -> Self {
        Self::with_handler(ScriptedHandler::new())
    }

    pub fn with_handler(handler: ScriptedHandler) -> Self {
        let handler = Arc::new(handler);
        let ledger: Arc<dyn InstallationLedger> = Arc::new(MemoryLedger::new());
        Self {
            engine: LifecycleEngine::new(dispatcher(&handler), ledger),
            handler,
            dir: None,
        }
    }

    /// Engine over a TOML ledger in a fresh temporary directory.
    pub fn with_toml_ledger() -> Self {
        let dir = Arc::new(TempDir::new().unwrap());
        Self::open(dir, Arc::new(ScriptedHandler::new()))
    }

    /// A second engine over the same ledger file, with fresh realms, as a
    /// restarted process would see it.
    ///
    /// # Panics
    ///
    /// Panics if this harness does not use a TOML ledger.
    pub fn restart(&self) -> Self {
        let dir = self
            .dir
            .clone()
            .expect("restart needs a harness created with_toml_ledger");
        Self::open(dir, Arc::new(ScriptedHandler::new()))
    }

    fn open(dir: Arc<TempDir>, handler: Arc<ScriptedHandler>) -> Self {
        let ledger = TomlLedger::open(dir.path().join("ledger.toml")).unwrap();
        Self {
            engine: LifecycleEngine::new(dispatcher(&handler), Arc::new(ledger)),
            handler,
            dir: Some(dir),
        }
    }

    pub fn handler(&self) -> &ScriptedHandler {
        &self.handler
    }

    pub fn ledger_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.path().join("ledger.toml"))
    }

    pub fn root(&self) -> Option<&Path> {
        self.dir.as_deref().map(TempDir::path)
    }

    /// Resolve `symbol` the way code running in `namespace` would.
    pub fn resolve_symbol(&self, symbol: &str, namespace: &Namespace) -> Option<LoadedSymbol> {
        let mut context = ExecutionContext::new(namespace.clone());
        let active = self.engine.activator().activate(&mut context);
        active.realm().resolve(symbol)
    }
}

impl Deref for TestEngine {
    type Target = LifecycleEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

fn dispatcher(handler: &Arc<ScriptedHandler>) -> HandlerDispatcher {
    let mut dispatcher = HandlerDispatcher::with_builtins();
    dispatcher.register(handler.clone());
    dispatcher
}
