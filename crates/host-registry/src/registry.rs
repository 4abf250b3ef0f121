//! Registry of active extensions.
//!
//! The registry owns the ordered collection of extension descriptors, their
//! load state, and the memo of include-file loads. It is the single owner of
//! [`Extension`] values; the dependency graph borrows node data for one
//! resolution pass and hands derived data back.
//!
//! Loading is epoch-based: `load_all` runs at most once per epoch and
//! `reload` starts a new one. Include files are memoized for the lifetime of
//! the registry, success and failure alike, so repeated lookups cost one map
//! probe.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::dependency::{DependencyEdge, DependencyGraph};
use crate::error::{Error, Result};
use crate::extension::{Extension, ExtensionKind, ResolvedDependencies};
use crate::handler::HandlerTable;
use crate::loader::SourceLoader;
use crate::manifest::ExtensionInfo;
use crate::DECLARATION_FILENAME;

/// Ordered collection of active extensions.
pub struct ExtensionRegistry {
    extensions: IndexMap<String, Extension>,
    loader: Box<dyn SourceLoader>,
    loaded: HashSet<String>,
    all_loaded: bool,
    include_memo: HashMap<(String, String, String), Option<PathBuf>>,
}

impl ExtensionRegistry {
    /// Create an empty registry backed by `loader`.
    pub fn new(loader: Box<dyn SourceLoader>) -> Self {
        Self {
            extensions: IndexMap::new(),
            loader,
            loaded: HashSet::new(),
            all_loaded: false,
            include_memo: HashMap::new(),
        }
    }

    /// Register a new extension descriptor.
    ///
    /// The loader is consulted once to infer whether the extension has a
    /// primary source file; the declaration file is recorded when present
    /// on disk. Registering does not load anything.
    pub fn add(&mut self, kind: ExtensionKind, name: &str, path: impl Into<PathBuf>) {
        let mut ext = Extension::new(kind, name, path);
        ext.primary_path = self.loader.locate_primary(&ext);
        let info_path = ext.path.join(DECLARATION_FILENAME);
        if info_path.exists() {
            ext.info_path = Some(info_path);
        }
        self.extensions.insert(ext.name.clone(), ext);
    }

    /// Register an extension from a parsed declaration.
    pub fn add_from_info(&mut self, info: &ExtensionInfo, path: impl Into<PathBuf>) {
        let meta = &info.extension;
        let mut ext = Extension::new(meta.kind, meta.name.as_str(), path);
        ext.primary_path = self.loader.locate_primary(&ext);
        ext.info_path = Some(ext.path.join(DECLARATION_FILENAME));
        ext.dependencies = meta.dependencies.clone();
        self.extensions.insert(ext.name.clone(), ext);
    }

    /// Scan `root` for immediate subdirectories carrying a declaration file
    /// and register each one. Returns the names added, in scan order
    /// (sorted for determinism).
    pub fn discover(&mut self, root: &Path) -> Result<Vec<String>> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir() && p.join(DECLARATION_FILENAME).exists())
            .collect();
        dirs.sort();

        let mut added = Vec::new();
        for dir in dirs {
            let info = ExtensionInfo::from_path(&dir.join(DECLARATION_FILENAME))?;
            let name = info.extension.name.clone();
            self.add_from_info(&info, dir);
            added.push(name);
        }
        Ok(added)
    }

    /// Look up an extension by name.
    pub fn get(&self, name: &str) -> Result<&Extension> {
        self.extensions
            .get(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))
    }

    /// Whether an extension is registered. Never fails.
    pub fn exists(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Registered extension names in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.extensions.keys().map(String::as_str).collect()
    }

    /// Registered extensions in registry order.
    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    /// Names of currently loaded extensions, in registry order.
    pub fn loaded_names(&self) -> Vec<String> {
        self.extensions
            .keys()
            .filter(|name| self.loaded.contains(*name))
            .cloned()
            .collect()
    }

    /// Whether an extension's primary file has been loaded this epoch.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Load an extension's primary file, registering its handlers.
    ///
    /// Idempotent: an already-loaded extension is a no-op. Returns whether
    /// the extension is known; extensions without a primary file count as
    /// loaded once requested.
    pub fn load(&mut self, name: &str, table: &mut HandlerTable) -> Result<bool> {
        let Some(ext) = self.extensions.get(name) else {
            return Ok(false);
        };
        if self.loaded.contains(name) {
            return Ok(true);
        }
        if let Some(primary) = ext.primary_path.clone() {
            self.loader.load(name, &primary, table)?;
            tracing::debug!(extension = name, "loaded extension");
        }
        self.loaded.insert(name.to_string());
        Ok(true)
    }

    /// Load every registered extension once per epoch.
    pub fn load_all(&mut self, table: &mut HandlerTable) -> Result<()> {
        if self.all_loaded {
            return Ok(());
        }
        let names: Vec<String> = self.extensions.keys().cloned().collect();
        for name in names {
            self.load(&name, table)?;
        }
        self.all_loaded = true;
        Ok(())
    }

    /// Start a new loaded epoch and load everything again.
    pub fn reload(&mut self, table: &mut HandlerTable) -> Result<()> {
        self.all_loaded = false;
        self.loaded.clear();
        self.load_all(table)
    }

    /// Load a named include file at most once per (name, kind, label)
    /// triple.
    ///
    /// `label` defaults to the extension name. Both outcomes are memoized:
    /// a found file yields its path on every call, a missing one yields
    /// `None` without consulting the loader again. Unknown extensions yield
    /// `None`.
    pub fn load_include(
        &mut self,
        table: &mut HandlerTable,
        name: &str,
        kind: &str,
        label: Option<&str>,
    ) -> Option<PathBuf> {
        let label = label.unwrap_or(name).to_string();
        let key = (name.to_string(), kind.to_string(), label.clone());
        if let Some(memo) = self.include_memo.get(&key) {
            return memo.clone();
        }

        let located = self
            .extensions
            .get(name)
            .and_then(|ext| self.loader.locate_include(ext, kind, &label));
        let result = match located {
            Some(path) => match self.loader.load(name, &path, table) {
                Ok(()) => Some(path),
                Err(err) => {
                    tracing::warn!(extension = name, error = %err, "include file failed to load");
                    None
                }
            },
            None => None,
        };

        self.include_memo.insert(key, result.clone());
        result
    }

    /// Remove an extension and every handler it registered.
    pub fn remove(&mut self, name: &str, table: &mut HandlerTable) -> Result<Extension> {
        let ext = self
            .extensions
            .shift_remove(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        self.loaded.remove(name);
        table.remove_extension(name);
        Ok(ext)
    }

    /// Replace the active extension set.
    ///
    /// Drops all load state and every registered handler; the new set starts
    /// a fresh epoch. The include memo survives, scoped to the context.
    pub fn set_extension_list(&mut self, extensions: Vec<Extension>, table: &mut HandlerTable) {
        self.extensions = extensions
            .into_iter()
            .map(|ext| (ext.name.clone(), ext))
            .collect();
        self.loaded.clear();
        self.all_loaded = false;
        table.clear();
    }

    /// Parse dependencies, resolve the graph, and write derived data back.
    ///
    /// Afterwards every extension carries a complete
    /// [`ResolvedDependencies`] and the registry iterates in load order:
    /// dependencies first, declaration order breaking ties.
    pub fn resolve_dependencies(&mut self) -> Result<()> {
        let mut graph = DependencyGraph::new();
        for ext in self.extensions.values() {
            graph.add_node(ext.name.as_str());
            for raw in &ext.dependencies {
                let edge = DependencyEdge::parse(raw)?;
                graph.add_edge(&ext.name, &edge.name);
            }
        }

        for (name, resolution) in graph.resolve() {
            if let Some(ext) = self.extensions.get_mut(&name) {
                ext.resolved = Some(ResolvedDependencies {
                    requires: resolution.requires,
                    required_by: resolution.required_by,
                    weight: resolution.weight,
                });
            }
        }

        self.extensions.sort_by(|_, a, _, b| {
            a.weight()
                .unwrap_or(i64::MAX)
                .cmp(&b.weight().unwrap_or(i64::MAX))
        });
        Ok(())
    }
}
