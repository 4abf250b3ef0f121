//! Extension model and registry for Extension Host.
//!
//! This crate provides extension declarations, dependency parsing and graph
//! resolution, the handler registration table, source loading, and the
//! registry that owns extension lifecycle. Hook discovery and dispatch build
//! on top of it in `host-dispatch`.

pub mod dependency;
pub mod error;
pub mod extension;
pub mod handler;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod version;

/// The canonical filename for extension declaration files.
///
/// Extensions place a file with this name in their directory so the host can
/// discover and validate them.
pub const DECLARATION_FILENAME: &str = "extension.toml";

pub use dependency::{DependencyEdge, DependencyGraph, Resolution};
pub use error::{Error, Result};
pub use extension::{Extension, ExtensionKind, ResolvedDependencies};
pub use handler::{
    ALTER_SUFFIX, AlterHook, AlterResult, HandlerTable, Hook, HookError, HookResult,
};
pub use loader::{MemoryLoader, SourceLoader};
pub use manifest::{ExtensionInfo, ExtensionMeta};
pub use registry::ExtensionRegistry;
pub use version::VersionConstraint;
