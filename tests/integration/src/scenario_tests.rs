//! End-to-end lifecycle scenarios

use ext_core::{EngineConfig, LifecycleEngine};
use ext_meta::{ExtensionDescriptor, MANIFEST_FILENAME, Namespace};
use ext_realm::ExecutionContext;
use ext_test_utils::{TestEngine, component, id, jar, ns};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn install_into_namespace_then_uninstall_everywhere() {
    let engine = TestEngine::new();
    let pkg = jar("a:pkg").with_dependency(id("a:dep", "1.0"));
    engine.install(&jar("a:dep"), &ns("ns1")).await.unwrap();
    engine.install(&pkg, &ns("ns1")).await.unwrap();

    assert!(engine.is_installed(&pkg.id, &ns("ns1")).unwrap());
    assert!(!engine.is_installed(&pkg.id, &Namespace::Global).unwrap());
    assert!(engine.get_installed_extension(&pkg.id, &Namespace::Global).unwrap().is_none());

    engine.uninstall(&pkg, &Namespace::Global).await.unwrap();

    assert!(!engine.is_installed(&pkg.id, &ns("ns1")).unwrap());
    assert!(engine.get_installed_extension(&pkg.id, &ns("ns1")).unwrap().is_none());
    assert!(engine.is_installed(&id("a:dep", "1.0"), &ns("ns1")).unwrap());
}

#[tokio::test]
async fn shared_global_dependency_survives_partial_uninstall() {
    let engine = TestEngine::new();
    let dep = jar("a:dep");
    let pkg = jar("a:pkg").with_dependency(dep.id.clone());
    engine.install(&dep, &Namespace::Global).await.unwrap();
    engine.install(&pkg, &ns("ns1")).await.unwrap();
    engine.install(&pkg, &ns("ns2")).await.unwrap();

    let shared = engine.resolve_symbol(&component("a:dep"), &ns("ns1")).unwrap();
    assert_eq!(
        engine.resolve_symbol(&component("a:dep"), &ns("ns2")),
        Some(shared.clone())
    );

    engine.uninstall(&pkg, &ns("ns1")).await.unwrap();

    assert!(engine.is_installed(&dep.id, &Namespace::Global).unwrap());
    assert!(!engine.is_installed(&pkg.id, &ns("ns1")).unwrap());
    assert!(engine.is_installed(&pkg.id, &ns("ns2")).unwrap());
    assert_eq!(
        engine.resolve_symbol(&component("a:dep"), &ns("ns2")),
        Some(shared)
    );
    assert_eq!(engine.registry().generation(&ns("ns1")), None);
}

#[tokio::test]
async fn upgrade_is_visible_without_a_gap() {
    let engine = TestEngine::new();
    let v1 = jar("a:pkg");
    let mut v2 = jar("a:pkg").with_export("a.pkg.NewApi");
    v2.id = id("a:pkg", "2.0");
    engine.install(&v1, &ns("ns1")).await.unwrap();
    let generation = engine.registry().generation(&ns("ns1"));

    engine.upgrade(&v1, &v2, &ns("ns1")).await.unwrap();

    assert_eq!(engine.registry().generation(&ns("ns1")), generation);
    assert!(engine.resolve_symbol("a.pkg.NewApi", &ns("ns1")).is_some());
    assert_eq!(
        engine
            .get_installed_feature("a:pkg", &ns("ns1"))
            .unwrap()
            .map(|record| record.descriptor.id),
        Some(v2.id)
    );
}

#[tokio::test]
async fn context_activation_follows_install_state() {
    let engine = TestEngine::new();
    let activator = engine.activator();
    let mut context = ExecutionContext::new(ns("ns1"));

    {
        let active = activator.activate(&mut context);
        assert_eq!(active.realm().namespace(), &Namespace::Global);
    }

    engine.install(&jar("a:pkg"), &ns("ns1")).await.unwrap();
    {
        let active = activator.activate(&mut context);
        assert_eq!(active.realm().namespace(), &ns("ns1"));
        assert!(active.realm().resolve(&component("a:pkg")).is_some());
    }
    assert!(context.active_realm().is_none());

    engine.uninstall(&jar("a:pkg"), &ns("ns1")).await.unwrap();
    let active = activator.activate(&mut context);
    assert_eq!(active.realm().namespace(), &Namespace::Global);
}

#[tokio::test]
async fn manifests_on_disk_drive_a_verified_install() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dep.jar"), b"PK").unwrap();
    std::fs::write(dir.path().join("pkg.jar"), b"PK").unwrap();

    let dep_manifest = dir.path().join("dep").join(MANIFEST_FILENAME);
    std::fs::create_dir_all(dep_manifest.parent().unwrap()).unwrap();
    std::fs::write(
        &dep_manifest,
        r#"
[extension]
name = "a:dep"
version = "1.0"
type = "jar"
artifact = "../dep.jar"
exports = ["a.dep.Component"]
"#,
    )
    .unwrap();

    let pkg_manifest = dir.path().join(MANIFEST_FILENAME);
    std::fs::write(
        &pkg_manifest,
        r#"
[extension]
name = "a:pkg"
version = "1.0"
type = "JAR"
artifact = "pkg.jar"
features = ["pkg"]
exports = ["a.pkg.Component"]

[[dependencies]]
name = "a:dep"
version = "1.0"
"#,
    )
    .unwrap();

    let config = EngineConfig::from_toml(&format!(
        "[ledger]\npath = {:?}\n\n[artifacts]\nverify = true\n",
        dir.path().join("ledger.toml").display().to_string()
    ))
    .unwrap();
    let engine = LifecycleEngine::from_config(&config).unwrap();

    let dep = ExtensionDescriptor::load(&dep_manifest).unwrap();
    let pkg = ExtensionDescriptor::load(&pkg_manifest).unwrap();
    engine.install(&dep, &Namespace::Global).await.unwrap();
    engine.install(&pkg, &ns("ns1")).await.unwrap();

    assert_eq!(
        engine
            .get_installed_feature("pkg", &ns("ns1"))
            .unwrap()
            .map(|record| record.descriptor.id),
        Some(id("a:pkg", "1.0"))
    );
    assert_eq!(engine.installed_extensions().unwrap().len(), 2);
}
