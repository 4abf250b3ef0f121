//! Result aggregation for `invoke_all`.
//!
//! Hook implementations return heterogeneous shapes: keyed mappings that
//! should merge into one structure, and bare values that should accumulate
//! as a sequence. [`MergedResult`] keeps the two apart explicitly instead of
//! inferring intent from the combined value at the end.

use serde_json::{Map, Value};

/// Accumulated results of one aggregated hook invocation.
///
/// Object results deep-merge into `map`; everything else appends to `items`
/// in invocation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedResult {
    /// Deep-merged keyed results. Later contributions win per key at each
    /// nesting level; sibling keys from different contributors survive.
    pub map: Map<String, Value>,
    /// Bare (non-object) results in invocation order.
    pub items: Vec<Value>,
}

impl MergedResult {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one implementation's result into the accumulator.
    pub fn push(&mut self, value: Value) {
        match value {
            Value::Object(object) => deep_merge(&mut self.map, object),
            other => self.items.push(other),
        }
    }

    /// Whether nothing was contributed.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty() && self.items.is_empty()
    }
}

/// Merge `incoming` into `target`, recursing where both sides hold objects
/// and overwriting otherwise.
pub fn deep_merge(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(update)) => {
                deep_merge(existing, update);
            }
            (Some(slot), value) => {
                *slot = value;
            }
            (None, value) => {
                target.insert(key, value);
            }
        }
    }
}
