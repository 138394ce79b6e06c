//! Descriptor and namespace shorthands.

use ext_handlers::ARTIFACT_TYPE;
use ext_meta::{ExtensionDescriptor, ExtensionId, Namespace};

use crate::handler::SCRIPTED_TYPE;

pub fn id(name: &str, version: &str) -> ExtensionId {
    ExtensionId::new(name, version)
}

pub fn ns(name: &str) -> Namespace {
    Namespace::named(name)
}

/// Symbol exported by the fixture extension `name`, e.g. `a.pkg.Component`.
pub fn component(name: &str) -> String {
    format!("{}.Component", name.replace(':', "."))
}

/// Version 1.0 of `name` served by the built-in artifact handler, exporting
/// [`component`]`(name)`.
pub fn jar(name: &str) -> ExtensionDescriptor {
    ExtensionDescriptor::new(id(name, "1.0"), ARTIFACT_TYPE, format!("{name}.jar"))
        .with_export(component(name))
}

/// Like [`jar`], but served by the [`ScriptedHandler`](crate::ScriptedHandler).
pub fn scripted(name: &str) -> ExtensionDescriptor {
    let mut descriptor = jar(name);
    descriptor.extension_type = SCRIPTED_TYPE.to_string();
    descriptor
}
