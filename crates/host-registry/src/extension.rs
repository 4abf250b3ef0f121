//! Extension descriptors and dependency-derived metadata.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The kind of an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    /// A regular functional extension.
    Module,
    /// An installation profile; participates in dispatch like a module.
    Profile,
    /// A presentation-layer extension.
    Theme,
}

impl std::fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionKind::Module => f.write_str("module"),
            ExtensionKind::Profile => f.write_str("profile"),
            ExtensionKind::Theme => f.write_str("theme"),
        }
    }
}

/// Dependency data derived by graph resolution.
///
/// The three fields are computed in one pass and only ever set together;
/// an extension either carries a complete resolution or none at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependencies {
    /// Names this extension requires, directly or transitively. May include
    /// names that are not registered.
    pub requires: BTreeSet<String>,
    /// Registered extensions that depend on this one, directly or
    /// transitively.
    pub required_by: BTreeSet<String>,
    /// Position in the dependency-first total order; lower loads earlier.
    pub weight: i64,
}

/// A registered extension.
///
/// Constructed from static declaration data when the registry is built or an
/// extension is added. The `resolved` field is populated only by the
/// dependency-resolution pass.
#[derive(Debug, Clone)]
pub struct Extension {
    /// Unique extension name.
    pub name: String,
    /// Extension kind.
    pub kind: ExtensionKind,
    /// Directory the extension was declared in.
    pub path: PathBuf,
    /// Declaration file backing this descriptor, when one exists.
    pub info_path: Option<PathBuf>,
    /// Primary source file, when the loader can locate one. Extensions
    /// without a primary file are metadata-only and never loaded.
    pub primary_path: Option<PathBuf>,
    /// Raw dependency declarations, e.g. `"node (>=1.0)"`.
    pub dependencies: Vec<String>,
    /// Graph-derived dependency data; `None` until resolution runs.
    pub resolved: Option<ResolvedDependencies>,
}

impl Extension {
    /// Create a descriptor with no declared dependencies.
    pub fn new(kind: ExtensionKind, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            info_path: None,
            primary_path: None,
            dependencies: Vec::new(),
            resolved: None,
        }
    }

    /// The load-order weight, when resolution has run.
    pub fn weight(&self) -> Option<i64> {
        self.resolved.as_ref().map(|r| r.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_display() {
        assert_eq!(ExtensionKind::Module.to_string(), "module");
        assert_eq!(ExtensionKind::Profile.to_string(), "profile");
        assert_eq!(ExtensionKind::Theme.to_string(), "theme");
    }

    #[test]
    fn test_new_extension_is_unresolved() {
        let ext = Extension::new(ExtensionKind::Module, "node", "modules/node");
        assert_eq!(ext.name, "node");
        assert!(ext.dependencies.is_empty());
        assert!(ext.resolved.is_none());
        assert!(ext.weight().is_none());
    }
}
