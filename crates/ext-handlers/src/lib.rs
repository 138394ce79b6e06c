//! Type dispatch for extension lifecycle operations.
//!
//! An extension's declared type selects the [`ExtensionHandler`] that knows
//! how to load it into a realm. [`HandlerDispatcher`] holds the mapping and
//! converts handler failures into [`InstallError`] and [`UninstallError`].

pub mod artifact;
pub mod dispatcher;
pub mod error;
pub mod handler;

pub use artifact::{ARTIFACT_TYPE, ArtifactHandler};
pub use dispatcher::{BoundHandler, HandlerDispatcher};
pub use error::{HandlerError, InstallError, NoHandlerFoundError, UninstallError};
pub use handler::ExtensionHandler;
