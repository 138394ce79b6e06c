//! Isolation and sharing properties of namespace-scoped installs
//!
//! Every test resolves symbols the way code running inside a namespace
//! would: through the context activation hook.

use std::sync::Arc;

use ext_handlers::InstallError;
use ext_meta::Namespace;
use ext_test_utils::{TestEngine, component, id, jar, ns};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case("ns1", "ns2")]
#[case("ns2", "ns1")]
#[case("tenant-a", "tenant-b")]
#[tokio::test]
async fn namespace_installs_are_invisible_elsewhere(#[case] home: &str, #[case] other: &str) {
    let engine = TestEngine::new();
    engine.install(&jar("a:pkg"), &ns(home)).await.unwrap();

    assert!(engine.resolve_symbol(&component("a:pkg"), &ns(home)).is_some());
    assert!(engine.resolve_symbol(&component("a:pkg"), &ns(other)).is_none());
    assert!(engine.resolve_symbol(&component("a:pkg"), &Namespace::Global).is_none());
}

#[tokio::test]
async fn same_extension_loads_separately_per_namespace() {
    let engine = TestEngine::new();
    engine.install(&jar("a:pkg"), &ns("ns1")).await.unwrap();
    engine.install(&jar("a:pkg"), &ns("ns2")).await.unwrap();

    let in_ns1 = engine.resolve_symbol(&component("a:pkg"), &ns("ns1")).unwrap();
    let in_ns2 = engine.resolve_symbol(&component("a:pkg"), &ns("ns2")).unwrap();
    assert_ne!(in_ns1, in_ns2);
    assert_eq!(in_ns1.realm.namespace, ns("ns1"));
    assert_eq!(in_ns2.realm.namespace, ns("ns2"));

    engine.uninstall(&jar("a:pkg"), &ns("ns1")).await.unwrap();
    assert!(engine.resolve_symbol(&component("a:pkg"), &ns("ns1")).is_none());
    assert_eq!(
        engine.resolve_symbol(&component("a:pkg"), &ns("ns2")),
        Some(in_ns2)
    );
}

#[rstest]
#[case("ns1")]
#[case("ns2")]
#[case("never-installed-here")]
#[tokio::test]
async fn global_installs_resolve_from_every_namespace(#[case] namespace: &str) {
    let engine = TestEngine::new();
    engine.install(&jar("a:dep"), &Namespace::Global).await.unwrap();
    engine.install(&jar("a:other"), &ns("ns1")).await.unwrap();

    let global = engine
        .resolve_symbol(&component("a:dep"), &Namespace::Global)
        .unwrap();
    assert_eq!(
        engine.resolve_symbol(&component("a:dep"), &ns(namespace)),
        Some(global)
    );
}

#[rstest]
#[case(Namespace::named("ns1"))]
#[case(Namespace::Global)]
#[tokio::test]
async fn reinstall_loads_a_distinct_definition(#[case] namespace: Namespace) {
    let engine = TestEngine::new();
    engine.install(&jar("a:pkg"), &namespace).await.unwrap();
    let first = engine.resolve_symbol(&component("a:pkg"), &namespace).unwrap();

    engine.uninstall(&jar("a:pkg"), &namespace).await.unwrap();
    assert!(engine.resolve_symbol(&component("a:pkg"), &namespace).is_none());

    engine.install(&jar("a:pkg"), &namespace).await.unwrap();
    let second = engine.resolve_symbol(&component("a:pkg"), &namespace).unwrap();

    assert_ne!(first, second);
    assert_eq!(first.name, second.name);
    if !namespace.is_global() {
        assert!(second.realm.generation > first.realm.generation);
    }
}

#[tokio::test]
async fn double_install_fails_and_keeps_first_installation() {
    let engine = TestEngine::new();
    let first = engine.install(&jar("a:pkg"), &ns("ns1")).await.unwrap();
    let symbol = engine.resolve_symbol(&component("a:pkg"), &ns("ns1")).unwrap();

    let err = engine.install(&jar("a:pkg"), &ns("ns1")).await.unwrap_err();
    assert!(matches!(err, InstallError::AlreadyInstalled(_)));

    assert_eq!(
        engine.get_installed_extension(&first.descriptor.id, &ns("ns1")).unwrap(),
        Some(first)
    );
    assert_eq!(
        engine.resolve_symbol(&component("a:pkg"), &ns("ns1")),
        Some(symbol)
    );
    assert_eq!(engine.registry().members(&ns("ns1")), 1);
}

#[tokio::test]
async fn global_dependency_is_shared_between_namespaces() {
    let engine = TestEngine::new();
    engine.install(&jar("a:dep"), &Namespace::Global).await.unwrap();
    let pkg = jar("a:pkg").with_dependency(id("a:dep", "1.0"));
    engine.install(&pkg, &ns("ns1")).await.unwrap();
    engine.install(&pkg, &ns("ns2")).await.unwrap();

    let from_ns1 = engine.resolve_symbol(&component("a:dep"), &ns("ns1")).unwrap();
    let from_ns2 = engine.resolve_symbol(&component("a:dep"), &ns("ns2")).unwrap();
    assert_eq!(from_ns1, from_ns2);

    let realm1 = engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns1")).unwrap().unwrap();
    let realm2 = engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns2")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&realm1, &realm2));
    assert!(Arc::ptr_eq(&realm1, &engine.registry().global()));
}

#[tokio::test]
async fn namespaced_dependency_is_private_per_namespace() {
    let engine = TestEngine::new();
    let pkg = jar("a:pkg").with_dependency(id("a:dep", "1.0"));
    for namespace in [ns("ns1"), ns("ns2")] {
        engine.install(&jar("a:dep"), &namespace).await.unwrap();
        engine.install(&pkg, &namespace).await.unwrap();
    }

    let from_ns1 = engine.resolve_symbol(&component("a:dep"), &ns("ns1")).unwrap();
    let from_ns2 = engine.resolve_symbol(&component("a:dep"), &ns("ns2")).unwrap();
    assert_ne!(from_ns1, from_ns2);

    let realm1 = engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns1")).unwrap().unwrap();
    let realm2 = engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns2")).unwrap().unwrap();
    assert_ne!(realm1.id(), realm2.id());
}

#[tokio::test]
async fn namespace_copy_of_dependency_wins_over_global() {
    let engine = TestEngine::new();
    engine.install(&jar("a:dep"), &ns("ns1")).await.unwrap();

    let realm = engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns1")).unwrap().unwrap();
    assert_eq!(realm.namespace(), &ns("ns1"));
    assert!(engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns2")).unwrap().is_none());
}

#[tokio::test]
async fn uninstalling_global_dependency_does_not_cascade() {
    let engine = TestEngine::new();
    engine.install(&jar("a:dep"), &Namespace::Global).await.unwrap();
    let pkg = jar("a:pkg").with_dependency(id("a:dep", "1.0"));
    engine.install(&pkg, &ns("ns1")).await.unwrap();

    engine.uninstall(&jar("a:dep"), &Namespace::Global).await.unwrap();

    let record = engine.get_installed_extension(&pkg.id, &ns("ns1")).unwrap().unwrap();
    assert_eq!(record.descriptor.dependencies, vec![id("a:dep", "1.0")]);
    assert!(engine.resolve_symbol(&component("a:pkg"), &ns("ns1")).is_some());
    assert!(engine.resolve_symbol(&component("a:dep"), &ns("ns1")).is_none());
    assert!(engine.resolve_dependency(&id("a:dep", "1.0"), &ns("ns1")).unwrap().is_none());

    // The dependent is only re-resolved on its own reinstall, which now fails.
    let err = engine.install(&pkg, &ns("ns2")).await.unwrap_err();
    assert!(matches!(err, InstallError::UnresolvedDependency { .. }));
}
