//! The dispatch context.
//!
//! [`HostContext`] wires the registry, handler table, caches, and persistent
//! backend together and exposes the dispatch API. One context serves one
//! logical execution (request or process run); it is built explicitly, used
//! single-threaded, and torn down with [`HostContext::flush`]. The backend
//! handle is the only piece shared with other contexts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;

use host_cache::CacheBackend;
use host_registry::{
    ALTER_SUFFIX, AlterHook, Extension, ExtensionKind, ExtensionRegistry, HandlerTable, Hook,
};

use crate::error::{Error, Result};
use crate::hook_info::{self, HOOK_INFO_HOOK, HookInfoTable};
use crate::implementations::{
    HookRecord, ImplementationCache, IncludeGroup, record_from_value, record_to_value,
};
use crate::merge::MergedResult;

/// Persistent-store key for the implementation record blob.
pub const IMPLEMENTATIONS_CACHE_KEY: &str = "hook_implementations";

/// Persistent-store key for hook metadata.
pub const HOOK_INFO_CACHE_KEY: &str = "hook_info";

/// Alter type dispatched after an implementation record is first built,
/// letting extensions reorder or remove entries.
pub const IMPLEMENTATIONS_ALTER_TYPE: &str = "implementations";

/// Hook name implementing [`IMPLEMENTATIONS_ALTER_TYPE`]. Its own record is
/// built without the alter pass, which bounds the self-reference.
pub const IMPLEMENTATIONS_ALTER_HOOK: &str = "implementations_alter";

/// Include-file kind that implementation groups load from.
const INCLUDE_KIND: &str = "inc";

type AlterList = Vec<(String, String, Rc<dyn AlterHook>)>;

/// Context object owning all dispatch state for one execution.
pub struct HostContext {
    registry: ExtensionRegistry,
    table: HandlerTable,
    backend: Rc<dyn CacheBackend>,
    implementations: ImplementationCache,
    alter_lists: HashMap<String, AlterList>,
    hook_info: Option<HookInfoTable>,
}

impl HostContext {
    /// Create a context over a registry and a persistent cache backend.
    pub fn new(registry: ExtensionRegistry, backend: Rc<dyn CacheBackend>) -> Self {
        Self {
            registry,
            table: HandlerTable::new(),
            backend,
            implementations: ImplementationCache::new(),
            alter_lists: HashMap::new(),
            hook_info: None,
        }
    }

    /// Read-only view of the registry.
    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Read-only view of the handler table.
    pub fn handlers(&self) -> &HandlerTable {
        &self.table
    }

    // --- lifecycle ---

    /// Resolve dependencies and load every extension in dependency order.
    pub fn bootstrap(&mut self) -> Result<()> {
        self.registry.resolve_dependencies()?;
        self.registry.load_all(&mut self.table)?;
        Ok(())
    }

    /// Load every registered extension once per epoch.
    pub fn load_all(&mut self) -> Result<()> {
        self.registry.load_all(&mut self.table)?;
        Ok(())
    }

    /// Start a new loaded epoch and load everything again.
    pub fn reload(&mut self) -> Result<()> {
        self.registry.reload(&mut self.table)?;
        Ok(())
    }

    /// Load one extension's primary file; returns whether it is known.
    pub fn load_extension(&mut self, name: &str) -> Result<bool> {
        Ok(self.registry.load(name, &mut self.table)?)
    }

    /// Load a named include file, memoized per (name, kind, label).
    pub fn load_include(
        &mut self,
        name: &str,
        kind: &str,
        label: Option<&str>,
    ) -> Option<PathBuf> {
        self.registry.load_include(&mut self.table, name, kind, label)
    }

    /// Register a new extension and drop every discovery cache.
    pub fn add_extension(&mut self, kind: ExtensionKind, name: &str, path: impl Into<PathBuf>) {
        self.registry.add(kind, name, path);
        self.invalidate_caches();
    }

    /// Remove an extension, its handlers, and every discovery cache.
    pub fn remove_extension(&mut self, name: &str) -> Result<()> {
        self.registry.remove(name, &mut self.table)?;
        self.invalidate_caches();
        Ok(())
    }

    /// Replace the active extension set and drop every discovery cache.
    pub fn set_extension_list(&mut self, extensions: Vec<Extension>) {
        self.registry.set_extension_list(extensions, &mut self.table);
        self.invalidate_caches();
    }

    /// Explicitly drop every discovery cache, in-process and persisted.
    pub fn reset_caches(&mut self) {
        self.invalidate_caches();
    }

    /// Write pending cache state to the backend. Call at context end.
    pub fn flush(&mut self) {
        if self.implementations.write_required() {
            self.backend
                .set(IMPLEMENTATIONS_CACHE_KEY, self.implementations.to_store_value());
            self.implementations.mark_flushed();
            tracing::debug!("flushed hook implementation records");
        }
    }

    // --- discovery ---

    /// Ordered names of the extensions implementing `hook`.
    pub fn implementations(&mut self, hook: &str) -> Result<Vec<String>> {
        self.ensure_record(hook)?;
        Ok(self
            .implementations
            .record(hook)
            .map(|record| record.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Whether `hook` is implemented at all or, when `extensions` is given,
    /// by any of those extensions.
    ///
    /// With explicit names a fast path probes the handler table first,
    /// bypassing the cache, so hooks that never enter the persistent cache
    /// remain probeable.
    pub fn has_implementations(
        &mut self,
        hook: &str,
        extensions: Option<&[&str]>,
    ) -> Result<bool> {
        if let Some(names) = extensions {
            if names.iter().any(|extension| self.table.exists(extension, hook)) {
                return Ok(true);
            }
            let implementers = self.implementations(hook)?;
            return Ok(names
                .iter()
                .any(|name| implementers.iter().any(|i| i == name)));
        }
        Ok(!self.implementations(hook)?.is_empty())
    }

    // --- invocation ---

    /// Call `visitor(extension, handler)` once per implementing extension,
    /// in cache order. Side effects only; both invocation modes build on
    /// this.
    pub fn invoke_all_with<F>(&mut self, hook: &str, mut visitor: F) -> Result<()>
    where
        F: FnMut(&str, &dyn Hook) -> Result<()>,
    {
        self.ensure_record(hook)?;
        let pairs: Vec<(String, Rc<dyn Hook>)> = match self.implementations.record(hook) {
            Some(record) => record
                .keys()
                .filter_map(|ext| self.table.hook(ext, hook).map(|h| (ext.clone(), h)))
                .collect(),
            None => Vec::new(),
        };
        for (extension, handler) in pairs {
            visitor(&extension, handler.as_ref())?;
        }
        Ok(())
    }

    /// Invoke one extension's implementation of `hook`, if present.
    ///
    /// Probes the handler table directly; an extension without an
    /// implementation yields `Ok(None)`, not an error.
    pub fn invoke(&self, extension: &str, hook: &str, args: &[Value]) -> Result<Option<Value>> {
        let Some(handler) = self.table.hook(extension, hook) else {
            return Ok(None);
        };
        handler.invoke(args).map_err(|source| Error::Callee {
            extension: extension.to_string(),
            hook: hook.to_string(),
            source,
        })
    }

    /// Invoke every implementation of `hook` in order and merge the results.
    pub fn invoke_all(&mut self, hook: &str, args: &[Value]) -> Result<MergedResult> {
        let mut merged = MergedResult::new();
        self.invoke_all_with(hook, |extension, handler| {
            let result = handler.invoke(args).map_err(|source| Error::Callee {
                extension: extension.to_string(),
                hook: hook.to_string(),
                source,
            })?;
            if let Some(value) = result {
                merged.push(value);
            }
            Ok(())
        })?;
        Ok(merged)
    }

    // --- alter ---

    /// Pass `data` through every alter implementation of `alter_type`.
    pub fn alter(
        &mut self,
        alter_type: &str,
        data: &mut Value,
        context1: Option<&mut Value>,
        context2: Option<&mut Value>,
    ) -> Result<()> {
        self.alter_many(&[alter_type], data, context1, context2)
    }

    /// Pass `data` through the alter implementations of several types.
    ///
    /// Extensions implementing the first type lead; extensions implementing
    /// only later types follow in discovery order. Each extension's handlers
    /// run in the given type order. The resolved list is memoized per type
    /// combination for the rest of the context.
    pub fn alter_many(
        &mut self,
        types: &[&str],
        data: &mut Value,
        mut context1: Option<&mut Value>,
        mut context2: Option<&mut Value>,
    ) -> Result<()> {
        let cid = types.join(",");
        if !self.alter_lists.contains_key(&cid) {
            let list = self.build_alter_list(types)?;
            self.alter_lists.insert(cid.clone(), list);
        }

        let list = self.alter_lists.get(&cid).cloned().unwrap_or_default();
        for (extension, alter_type, handler) in list {
            handler
                .alter(data, context1.as_deref_mut(), context2.as_deref_mut())
                .map_err(|source| Error::Callee {
                    extension,
                    hook: format!("{alter_type}{ALTER_SUFFIX}"),
                    source,
                })?;
        }
        Ok(())
    }

    fn build_alter_list(&mut self, types: &[&str]) -> Result<AlterList> {
        let mut order: Vec<String> = Vec::new();
        for alter_type in types {
            let hook = format!("{alter_type}{ALTER_SUFFIX}");
            for extension in self.implementations(&hook)? {
                if !order.contains(&extension) {
                    order.push(extension);
                }
            }
        }

        let mut list = AlterList::new();
        for extension in &order {
            for alter_type in types {
                if let Some(handler) = self.table.alter_hook(extension, alter_type) {
                    list.push((extension.clone(), alter_type.to_string(), handler));
                }
            }
        }
        Ok(list)
    }

    // --- deprecation shims ---

    /// [`invoke`](Self::invoke) plus a deprecation notice when the extension
    /// implements the hook.
    pub fn invoke_deprecated(
        &mut self,
        description: &str,
        extension: &str,
        hook: &str,
        args: &[Value],
    ) -> Result<Option<Value>> {
        if self.table.exists(extension, hook) {
            tracing::warn!(hook, extension, "deprecated hook invoked; {description}");
        }
        self.invoke(extension, hook, args)
    }

    /// [`invoke_all`](Self::invoke_all) plus a deprecation notice naming
    /// every still-active implementing extension.
    pub fn invoke_all_deprecated(
        &mut self,
        description: &str,
        hook: &str,
        args: &[Value],
    ) -> Result<MergedResult> {
        self.warn_deprecated(description, hook)?;
        self.invoke_all(hook, args)
    }

    /// [`alter`](Self::alter) plus a deprecation notice naming every
    /// still-active implementing extension.
    pub fn alter_deprecated(
        &mut self,
        description: &str,
        alter_type: &str,
        data: &mut Value,
        context1: Option<&mut Value>,
        context2: Option<&mut Value>,
    ) -> Result<()> {
        let hook = format!("{alter_type}{ALTER_SUFFIX}");
        self.warn_deprecated(description, &hook)?;
        self.alter(alter_type, data, context1, context2)
    }

    fn warn_deprecated(&mut self, description: &str, hook: &str) -> Result<()> {
        let implementers = self.implementations(hook)?;
        if !implementers.is_empty() {
            tracing::warn!(
                hook,
                extensions = %implementers.join(", "),
                "deprecated hook is still implemented; {description}"
            );
        }
        Ok(())
    }

    // --- internals ---

    /// Bring the record for `hook` to the verified state, seeding from the
    /// store, verifying, or building as needed.
    fn ensure_record(&mut self, hook: &str) -> Result<()> {
        if !self.implementations.seeded() {
            let stored = self.backend.get(IMPLEMENTATIONS_CACHE_KEY);
            self.implementations.seed(stored);
        }

        if self.implementations.contains(hook) {
            if !self.implementations.is_verified(hook) {
                self.verify_record(hook);
            }
            return Ok(());
        }

        let record = self.build_record(hook)?;
        self.implementations.insert_built(hook, record);
        Ok(())
    }

    /// Check a seeded record against the live handler table, dropping
    /// entries whose handler has disappeared since the record was persisted.
    fn verify_record(&mut self, hook: &str) {
        let Some(record) = self.implementations.record(hook) else {
            return;
        };
        let record = record.clone();

        let mut kept = HookRecord::new();
        let mut dropped = false;
        for (extension, group) in record {
            if let IncludeGroup::Group(group_name) = &group {
                self.load_group_include(&extension, group_name);
            }
            if self.table.exists(&extension, hook) {
                kept.insert(extension, group);
            } else {
                tracing::debug!(
                    hook,
                    extension = %extension,
                    "dropping stale implementation record entry"
                );
                dropped = true;
            }
        }

        if dropped {
            self.implementations.mark_dirty();
        }
        self.implementations.mark_verified(hook, kept);
    }

    /// Full discovery scan for one hook, followed by the alter pass.
    fn build_record(&mut self, hook: &str) -> Result<HookRecord> {
        let group = self.hook_group(hook)?;

        let mut record = HookRecord::new();
        for extension in self.registry.loaded_names() {
            let mut include = IncludeGroup::None;
            if let Some(group_name) = &group {
                if self.load_group_include(&extension, group_name).is_some() {
                    include = IncludeGroup::Group(group_name.clone());
                }
            }
            if self.table.exists(&extension, hook) {
                record.insert(extension, include);
            }
        }

        // Let extensions adjust the record, except while building the record
        // of the hook that performs the adjusting.
        if hook != IMPLEMENTATIONS_ALTER_HOOK {
            let before = record.clone();
            let mut data = record_to_value(&record);
            let mut altered_hook = Value::String(hook.to_string());
            self.alter(
                IMPLEMENTATIONS_ALTER_TYPE,
                &mut data,
                Some(&mut altered_hook),
                None,
            )?;
            record = record_from_value(data).map_err(|reason| Error::InvalidAlteredRecord {
                hook: hook.to_string(),
                reason,
            })?;

            // An entry the alter pass introduced or regrouped must be backed
            // by a live handler; a stale one would have been dropped above,
            // so a missing handler here means a broken extension.
            for (extension, include) in &record {
                if before.get(extension) == Some(include) {
                    continue;
                }
                if let IncludeGroup::Group(group_name) = include {
                    self.load_group_include(extension, group_name);
                }
                if !self.table.exists(extension, hook) {
                    return Err(Error::FabricatedImplementation {
                        extension: extension.clone(),
                        hook: hook.to_string(),
                    });
                }
            }
        }

        Ok(record)
    }

    fn load_group_include(&mut self, extension: &str, group: &str) -> Option<PathBuf> {
        self.registry.load_include(
            &mut self.table,
            extension,
            INCLUDE_KIND,
            Some(&format!("{extension}.{group}")),
        )
    }

    /// The include group declared for `hook`, if any.
    fn hook_group(&mut self, hook: &str) -> Result<Option<String>> {
        self.ensure_hook_info()?;
        Ok(self
            .hook_info
            .as_ref()
            .and_then(|table| table.get(hook))
            .map(|info| info.group.clone()))
    }

    fn ensure_hook_info(&mut self) -> Result<()> {
        if self.hook_info.is_some() {
            return Ok(());
        }

        if let Some(stored) = self.backend.get(HOOK_INFO_CACHE_KEY) {
            match hook_info::table_from_value(stored) {
                Ok(table) => {
                    self.hook_info = Some(table);
                    return Ok(());
                }
                Err(_) => {
                    tracing::debug!("stored hook metadata unreadable; rebuilding");
                }
            }
        }

        // Discovery goes through direct invocation, never the
        // implementation cache, so building metadata cannot recurse into a
        // record build.
        let mut merged = MergedResult::new();
        for extension in self.registry.loaded_names() {
            if let Some(value) = self.invoke(&extension, HOOK_INFO_HOOK, &[])? {
                merged.push(value);
            }
        }

        let table = hook_info::table_from_value(Value::Object(merged.map))?;
        self.backend
            .set(HOOK_INFO_CACHE_KEY, hook_info::table_to_value(&table));
        self.hook_info = Some(table);
        Ok(())
    }

    fn invalidate_caches(&mut self) {
        self.implementations.clear();
        self.alter_lists.clear();
        self.hook_info = None;
        self.backend.delete(IMPLEMENTATIONS_CACHE_KEY);
        self.backend.delete(HOOK_INFO_CACHE_KEY);
        tracing::debug!("invalidated hook discovery caches");
    }
}
