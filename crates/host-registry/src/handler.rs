//! Handler registration table.
//!
//! Extensions participate in hooks by registering handler objects under a
//! hook-name key while their source files load, rather than by exposing
//! callables for runtime name resolution. The table is the single authority
//! on "does extension E implement hook H right now": discovery caches are
//! always verified against it.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

/// Error type raised by hook implementations; carried through dispatch
/// unchanged.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Return type of a regular hook implementation.
pub type HookResult = std::result::Result<Option<Value>, HookError>;

/// Return type of an alter implementation.
pub type AlterResult = std::result::Result<(), HookError>;

/// Suffix appended to an alter type to form its hook name.
pub const ALTER_SUFFIX: &str = "_alter";

/// A hook implementation.
///
/// Returning `Ok(None)` contributes nothing to an aggregated invocation.
pub trait Hook {
    fn invoke(&self, args: &[Value]) -> HookResult;
}

impl<F> Hook for F
where
    F: Fn(&[Value]) -> HookResult,
{
    fn invoke(&self, args: &[Value]) -> HookResult {
        self(args)
    }
}

/// An alter implementation: mutates shared data in place.
///
/// The two context slots mirror the data argument; both are passed through
/// every callee of one alter call.
pub trait AlterHook {
    fn alter(
        &self,
        data: &mut Value,
        context1: Option<&mut Value>,
        context2: Option<&mut Value>,
    ) -> AlterResult;
}

impl<F> AlterHook for F
where
    F: Fn(&mut Value, Option<&mut Value>, Option<&mut Value>) -> AlterResult,
{
    fn alter(
        &self,
        data: &mut Value,
        context1: Option<&mut Value>,
        context2: Option<&mut Value>,
    ) -> AlterResult {
        self(data, context1, context2)
    }
}

enum Registered {
    Hook(Rc<dyn Hook>),
    Alter(Rc<dyn AlterHook>),
}

/// Registration table mapping (extension, hook name) to handlers.
///
/// Alter handlers are registered under their type plus [`ALTER_SUFFIX`], so
/// discovery treats regular and alter hooks uniformly.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, HashMap<String, Registered>>,
}

impl HandlerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook implementation, replacing any previous registration
    /// for the same (extension, hook) pair.
    pub fn register_hook(&mut self, extension: &str, hook: &str, handler: impl Hook + 'static) {
        self.handlers
            .entry(extension.to_string())
            .or_default()
            .insert(hook.to_string(), Registered::Hook(Rc::new(handler)));
    }

    /// Register an alter implementation for `alter_type`.
    pub fn register_alter(
        &mut self,
        extension: &str,
        alter_type: &str,
        handler: impl AlterHook + 'static,
    ) {
        self.handlers
            .entry(extension.to_string())
            .or_default()
            .insert(
                format!("{alter_type}{ALTER_SUFFIX}"),
                Registered::Alter(Rc::new(handler)),
            );
    }

    /// Whether any handler is registered under (extension, hook).
    pub fn exists(&self, extension: &str, hook: &str) -> bool {
        self.handlers
            .get(extension)
            .is_some_and(|hooks| hooks.contains_key(hook))
    }

    /// The hook implementation registered under (extension, hook), if any.
    pub fn hook(&self, extension: &str, hook: &str) -> Option<Rc<dyn Hook>> {
        match self.handlers.get(extension)?.get(hook)? {
            Registered::Hook(handler) => Some(Rc::clone(handler)),
            Registered::Alter(_) => None,
        }
    }

    /// The alter implementation registered for `alter_type`, if any.
    pub fn alter_hook(&self, extension: &str, alter_type: &str) -> Option<Rc<dyn AlterHook>> {
        let hook = format!("{alter_type}{ALTER_SUFFIX}");
        match self.handlers.get(extension)?.get(&hook)? {
            Registered::Alter(handler) => Some(Rc::clone(handler)),
            Registered::Hook(_) => None,
        }
    }

    /// Remove one registration. Returns whether anything was removed.
    pub fn remove_hook(&mut self, extension: &str, hook: &str) -> bool {
        match self.handlers.get_mut(extension) {
            Some(hooks) => hooks.remove(hook).is_some(),
            None => false,
        }
    }

    /// Remove every registration for an extension. Returns how many handlers
    /// were dropped.
    pub fn remove_extension(&mut self, extension: &str) -> usize {
        self.handlers
            .remove(extension)
            .map(|hooks| hooks.len())
            .unwrap_or(0)
    }

    /// Drop all registrations.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.values().map(HashMap::len).sum()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
