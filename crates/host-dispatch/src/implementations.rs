//! Cached hook implementation records.
//!
//! For every hook name the cache holds an insertion-ordered map from
//! extension name to the include group the implementation lives in. Records
//! are built lazily, kept in-process for the life of the context, and
//! persisted as one blob so a later context can start from them. A record
//! loaded from the store is untrusted until verified against the live
//! handler table; verification drops stale entries silently and flags the
//! blob for rewrite.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Where a hook implementation lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeGroup {
    /// The extension's primary file, loaded at registry load time.
    None,
    /// A named include group: the file `<extension>.<group>.inc` must be
    /// loaded before the handler is registered.
    Group(String),
}

/// Ordered implementation record for one hook.
pub type HookRecord = IndexMap<String, IncludeGroup>;

/// Serialize a record for the persistent store or an alter pass.
///
/// Entries become `false` (primary file) or the group name, matching the
/// shape alter implementations receive and mutate.
pub fn record_to_value(record: &HookRecord) -> Value {
    let mut map = Map::new();
    for (extension, group) in record {
        let value = match group {
            IncludeGroup::None => Value::Bool(false),
            IncludeGroup::Group(name) => Value::String(name.clone()),
        };
        map.insert(extension.clone(), value);
    }
    Value::Object(map)
}

/// Read a record back from its value shape.
pub fn record_from_value(value: Value) -> Result<HookRecord, String> {
    let Value::Object(map) = value else {
        return Err("record must be a keyed mapping".to_string());
    };
    let mut record = HookRecord::new();
    for (extension, group) in map {
        let group = match group {
            Value::Bool(false) => IncludeGroup::None,
            Value::String(name) => IncludeGroup::Group(name),
            other => {
                return Err(format!(
                    "entry '{extension}' must be false or a group name, got {other}"
                ));
            }
        };
        record.insert(extension, group);
    }
    Ok(record)
}

/// Two-tier cache of hook implementation records.
///
/// This type holds only state; the build and verification passes live on the
/// dispatch context, which owns the collaborators they need.
#[derive(Debug, Default)]
pub struct ImplementationCache {
    records: IndexMap<String, HookRecord>,
    verified: indexmap::IndexSet<String>,
    seeded: bool,
    write_required: bool,
}

impl ImplementationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the persistent store has been consulted this context.
    pub fn seeded(&self) -> bool {
        self.seeded
    }

    /// Seed the in-process tier from a persisted blob.
    ///
    /// Unreadable hooks or entries are skipped: stale or mangled persisted
    /// state is repaired on use, never surfaced. Seeded records stay
    /// unverified until their first use.
    pub fn seed(&mut self, stored: Option<Value>) {
        self.seeded = true;
        let Some(Value::Object(map)) = stored else {
            return;
        };
        for (hook, value) in map {
            match record_from_value(value) {
                Ok(record) => {
                    self.records.insert(hook, record);
                }
                Err(reason) => {
                    tracing::debug!(
                        hook = %hook,
                        reason = %reason,
                        "skipping unreadable implementation record"
                    );
                    self.write_required = true;
                }
            }
        }
    }

    /// Whether a record exists for `hook` (verified or not).
    pub fn contains(&self, hook: &str) -> bool {
        self.records.contains_key(hook)
    }

    /// Whether the record for `hook` has been verified this context.
    pub fn is_verified(&self, hook: &str) -> bool {
        self.verified.contains(hook)
    }

    /// The record for `hook`, if present.
    pub fn record(&self, hook: &str) -> Option<&HookRecord> {
        self.records.get(hook)
    }

    /// Store a freshly built record; marks it verified and the store dirty.
    pub fn insert_built(&mut self, hook: &str, record: HookRecord) {
        self.records.insert(hook.to_string(), record);
        self.verified.insert(hook.to_string());
        self.write_required = true;
    }

    /// Replace a seeded record with its verified form.
    pub fn mark_verified(&mut self, hook: &str, record: HookRecord) {
        self.records.insert(hook.to_string(), record);
        self.verified.insert(hook.to_string());
    }

    /// Flag the persistent blob for rewrite.
    pub fn mark_dirty(&mut self) {
        self.write_required = true;
    }

    /// Whether the persistent blob must be rewritten at flush.
    pub fn write_required(&self) -> bool {
        self.write_required
    }

    /// Clear the dirty flag after a successful flush.
    pub fn mark_flushed(&mut self) {
        self.write_required = false;
    }

    /// Serialize every record for the persistent store.
    pub fn to_store_value(&self) -> Value {
        let mut map = Map::new();
        for (hook, record) in &self.records {
            map.insert(hook.clone(), record_to_value(record));
        }
        Value::Object(map)
    }

    /// Drop all in-process state, returning to the pre-seed state.
    pub fn clear(&mut self) {
        self.records.clear();
        self.verified.clear();
        self.seeded = false;
        self.write_required = false;
    }
}
