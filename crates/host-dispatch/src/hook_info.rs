//! Hook metadata discovery.
//!
//! Hooks can declare that their implementations live in a named include
//! group instead of the extension's primary file. The mapping from hook name
//! to metadata is itself discovered through a hook: every loaded extension
//! may implement [`HOOK_INFO_HOOK`] and contribute entries. The merged
//! result is persisted and treated as read-only until caches are reset.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The discovery hook extensions implement to describe other hooks.
///
/// Implementations return a mapping like `{"token_list": {"group": "tokens"}}`,
/// meaning implementations of `token_list` live in `<extension>.tokens.inc`.
pub const HOOK_INFO_HOOK: &str = "hook_info";

/// Metadata for one hook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HookInfo {
    /// Include group the hook's implementations live in.
    pub group: String,
}

/// Full hook-metadata table.
pub type HookInfoTable = IndexMap<String, HookInfo>;

/// Parse a merged or persisted metadata blob.
pub fn table_from_value(value: Value) -> Result<HookInfoTable> {
    serde_json::from_value(value).map_err(|e| Error::InvalidHookInfo {
        reason: e.to_string(),
    })
}

/// Serialize a metadata table for the persistent store.
pub fn table_to_value(table: &HookInfoTable) -> Value {
    let mut map = serde_json::Map::new();
    for (hook, info) in table {
        map.insert(
            hook.clone(),
            serde_json::json!({"group": info.group.clone()}),
        );
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_table_round_trip() {
        let value = json!({"token_list": {"group": "tokens"}});
        let table = table_from_value(value.clone()).unwrap();
        assert_eq!(table["token_list"].group, "tokens");
        assert_eq!(table_to_value(&table), value);
    }

    #[test]
    fn test_empty_table() {
        let table = table_from_value(json!({})).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_bad_shape_rejected() {
        assert!(table_from_value(json!({"hook": "tokens"})).is_err());
        assert!(table_from_value(json!({"hook": {"grp": "tokens"}})).is_err());
        assert!(table_from_value(json!([])).is_err());
    }
}
