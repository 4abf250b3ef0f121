//! Source file location and loading.
//!
//! The registry never touches files directly; it asks a [`SourceLoader`] to
//! locate an extension's primary file or a named include file, and to load a
//! located file so the handlers it defines land in the [`HandlerTable`].
//! Loading is idempotent at the registry layer (loaded epochs and the
//! include memo), so loaders can stay stateless.
//!
//! [`MemoryLoader`] is the reference implementation: "files" are
//! registration closures keyed by synthetic paths. Hosts that discover
//! extensions elsewhere (static linking, dynamic libraries) implement the
//! trait over their own notion of a source file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::extension::Extension;
use crate::handler::HandlerTable;

/// Locates and loads extension source files.
pub trait SourceLoader {
    /// Locate the primary source file of `extension`, if one exists.
    fn locate_primary(&self, extension: &Extension) -> Option<PathBuf>;

    /// Locate the include file `<label>.<kind>` belonging to `extension`,
    /// if one exists.
    fn locate_include(&self, extension: &Extension, kind: &str, label: &str) -> Option<PathBuf>;

    /// Load a previously located file, registering its handlers.
    fn load(&self, extension: &str, file: &Path, table: &mut HandlerTable) -> Result<()>;
}

type Registration = Rc<dyn Fn(&mut HandlerTable)>;

/// In-memory source loader.
///
/// Primary files are keyed `<name>/<name>.main`; include files
/// `<name>/<label>.<kind>`. Each file is a closure that performs the
/// registrations the real file would.
#[derive(Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, Registration>,
}

impl MemoryLoader {
    /// Create a loader with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the primary file for `extension`.
    pub fn add_primary(
        &mut self,
        extension: &str,
        register: impl Fn(&mut HandlerTable) + 'static,
    ) -> PathBuf {
        let path = Self::primary_path(extension);
        self.files.insert(path.clone(), Rc::new(register));
        path
    }

    /// Add the include file `<label>.<kind>` for `extension`.
    pub fn add_include(
        &mut self,
        extension: &str,
        kind: &str,
        label: &str,
        register: impl Fn(&mut HandlerTable) + 'static,
    ) -> PathBuf {
        let path = Self::include_path(extension, kind, label);
        self.files.insert(path.clone(), Rc::new(register));
        path
    }

    fn primary_path(extension: &str) -> PathBuf {
        PathBuf::from(format!("{extension}/{extension}.main"))
    }

    fn include_path(extension: &str, kind: &str, label: &str) -> PathBuf {
        PathBuf::from(format!("{extension}/{label}.{kind}"))
    }
}

impl SourceLoader for MemoryLoader {
    fn locate_primary(&self, extension: &Extension) -> Option<PathBuf> {
        let path = Self::primary_path(&extension.name);
        self.files.contains_key(&path).then_some(path)
    }

    fn locate_include(&self, extension: &Extension, kind: &str, label: &str) -> Option<PathBuf> {
        let path = Self::include_path(&extension.name, kind, label);
        self.files.contains_key(&path).then_some(path)
    }

    fn load(&self, extension: &str, file: &Path, table: &mut HandlerTable) -> Result<()> {
        match self.files.get(file) {
            Some(register) => {
                register(table);
                Ok(())
            }
            None => Err(Error::Load {
                extension: extension.to_string(),
                file: file.to_path_buf(),
                reason: "no such source file".to_string(),
            }),
        }
    }
}
