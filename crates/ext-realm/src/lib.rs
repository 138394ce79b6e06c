//! Namespace-isolated loading realms.
//!
//! Every namespace that has at least one installed extension owns a private
//! [`Realm`]: a symbol table whose definitions are invisible to every other
//! namespace. The global realm is the parent of all namespace realms, so
//! globally installed symbols resolve from everywhere.
//!
//! ```text
//!              global realm (generation 0, never destroyed)
//!             /            \
//!   realm ns1 #g1       realm ns2 #g1
//! ```
//!
//! The [`RealmRegistry`] owns realm lifetimes: it reference-counts members,
//! tears a realm down when its count reaches zero and stamps every new realm
//! for a namespace with a fresh generation. [`ContextActivator`] switches an
//! [`ExecutionContext`] to the realm of the namespace it runs in.

pub mod activation;
pub mod error;
pub mod realm;
pub mod registry;

pub use activation::{ActiveRealm, ContextActivator, ExecutionContext};
pub use error::{Error, Result};
pub use realm::{LoadedSymbol, Realm, RealmId, StagedLoad};
pub use registry::{RealmLease, RealmRegistry};
