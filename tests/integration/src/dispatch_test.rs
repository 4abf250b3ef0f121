//! Cross-context dispatch tests: include-group loading, persisted discovery
//! records, self-healing verification, and the fatal fabrication path.

use std::cell::Cell;
use std::rc::Rc;

use host_cache::{CacheBackend, MemoryCache};
use host_dispatch::{
    Error, HOOK_INFO_CACHE_KEY, HostContext, IMPLEMENTATIONS_ALTER_TYPE,
    IMPLEMENTATIONS_CACHE_KEY,
};
use host_registry::{
    AlterResult, ExtensionKind, ExtensionRegistry, HookResult, MemoryLoader,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Loader for the include-group scenario: `a` implements "example" in its
/// primary file; `b` implements it in the include file `b.custom.inc`,
/// declared through `a`'s hook metadata. The counter tracks include loads.
fn include_scenario_loader(include_loads: Rc<Cell<usize>>) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    loader.add_primary("a", |table| {
        table.register_hook("a", "hook_info", |_args: &[Value]| -> HookResult {
            Ok(Some(json!({"example": {"group": "custom"}})))
        });
        table.register_hook("a", "example", |_args: &[Value]| -> HookResult {
            Ok(Some(json!("from a")))
        });
    });
    loader.add_primary("b", |_table| {});
    loader.add_include("b", "inc", "b.custom", move |table| {
        include_loads.set(include_loads.get() + 1);
        table.register_hook("b", "example", |_args: &[Value]| -> HookResult {
            Ok(Some(json!("from b")))
        });
    });
    loader
}

fn host_with(loader: MemoryLoader, names: &[&str], backend: Rc<MemoryCache>) -> HostContext {
    let mut registry = ExtensionRegistry::new(Box::new(loader));
    for name in names {
        registry.add(ExtensionKind::Module, name, format!("exts/{name}"));
    }
    let mut host = HostContext::new(registry, backend);
    host.bootstrap().unwrap();
    host
}

#[test]
fn test_include_file_loads_exactly_once() {
    init_tracing();
    let include_loads = Rc::new(Cell::new(0));
    let loader = include_scenario_loader(Rc::clone(&include_loads));
    let mut host = host_with(loader, &["a", "b"], Rc::new(MemoryCache::new()));

    let merged = host.invoke_all("example", &[]).unwrap();
    assert_eq!(merged.items, vec![json!("from a"), json!("from b")]);
    assert_eq!(include_loads.get(), 1);

    // Later calls in the same context perform zero additional loads.
    let merged = host.invoke_all("example", &[]).unwrap();
    assert_eq!(merged.items, vec![json!("from a"), json!("from b")]);
    assert_eq!(include_loads.get(), 1);
}

#[test]
fn test_persisted_records_skip_rescan_in_next_context() {
    init_tracing();
    let backend = Rc::new(MemoryCache::new());

    // First context: build, persist at teardown.
    let include_loads = Rc::new(Cell::new(0));
    let loader = include_scenario_loader(Rc::clone(&include_loads));
    let mut first = host_with(loader, &["a", "b"], Rc::clone(&backend));
    first.invoke_all("example", &[]).unwrap();
    first.flush();

    let stored = backend.get(IMPLEMENTATIONS_CACHE_KEY).unwrap();
    assert_eq!(stored["example"], json!({"a": false, "b": "custom"}));
    assert!(backend.get(HOOK_INFO_CACHE_KEY).is_some());

    // Second context over the same backend: verification trusts the record
    // after confirming handlers, loading b's include file once.
    let include_loads = Rc::new(Cell::new(0));
    let loader = include_scenario_loader(Rc::clone(&include_loads));
    let mut second = host_with(loader, &["a", "b"], Rc::clone(&backend));
    let merged = second.invoke_all("example", &[]).unwrap();
    assert_eq!(merged.items, vec![json!("from a"), json!("from b")]);
    assert_eq!(include_loads.get(), 1);

    // Nothing drifted, so nothing needs rewriting.
    second.flush();
    assert_eq!(
        backend.get(IMPLEMENTATIONS_CACHE_KEY).unwrap()["example"],
        json!({"a": false, "b": "custom"})
    );
}

#[test]
fn test_stale_persisted_entry_self_heals() {
    init_tracing();
    let backend = Rc::new(MemoryCache::new());

    // First context persists a record naming both extensions.
    let include_loads = Rc::new(Cell::new(0));
    let loader = include_scenario_loader(Rc::clone(&include_loads));
    let mut first = host_with(loader, &["a", "b"], Rc::clone(&backend));
    first.invoke_all("example", &[]).unwrap();
    first.flush();

    // Second context: b's include file no longer implements "example".
    let mut loader = MemoryLoader::new();
    loader.add_primary("a", |table| {
        table.register_hook("a", "hook_info", |_args: &[Value]| -> HookResult {
            Ok(Some(json!({"example": {"group": "custom"}})))
        });
        table.register_hook("a", "example", |_args: &[Value]| -> HookResult {
            Ok(Some(json!("from a")))
        });
    });
    loader.add_primary("b", |_table| {});
    loader.add_include("b", "inc", "b.custom", |table| {
        table.register_hook("b", "other", |_args: &[Value]| -> HookResult { Ok(None) });
    });
    let mut second = host_with(loader, &["a", "b"], Rc::clone(&backend));

    // The stale entry is dropped silently, not surfaced.
    let merged = second.invoke_all("example", &[]).unwrap();
    assert_eq!(merged.items, vec![json!("from a")]);
    assert_eq!(second.implementations("example").unwrap(), vec!["a"]);

    // Teardown rewrites the store without the stale entry.
    second.flush();
    let healed = backend.get(IMPLEMENTATIONS_CACHE_KEY).unwrap();
    assert_eq!(healed["example"], json!({"a": false}));
}

#[test]
fn test_fabricated_entry_is_a_hard_error() {
    init_tracing();
    let mut loader = MemoryLoader::new();
    loader.add_primary("a", |table| {
        table.register_hook("a", "foo", |_args: &[Value]| -> HookResult {
            Ok(Some(json!("a")))
        });
        table.register_alter(
            "a",
            IMPLEMENTATIONS_ALTER_TYPE,
            |data: &mut Value,
             context1: Option<&mut Value>,
             _c2: Option<&mut Value>|
             -> AlterResult {
                let for_hook = context1.and_then(|c| c.as_str().map(str::to_string));
                if for_hook.as_deref() == Some("foo") {
                    if let Value::Object(map) = data {
                        map.insert("ghost".to_string(), Value::Bool(false));
                    }
                }
                Ok(())
            },
        );
    });
    let mut host = host_with(loader, &["a"], Rc::new(MemoryCache::new()));

    let err = host.invoke_all("foo", &[]).unwrap_err();
    assert!(matches!(
        err,
        Error::FabricatedImplementation { ref extension, ref hook }
            if extension == "ghost" && hook == "foo"
    ));
}

#[test]
fn test_cache_reset_clears_backend_and_rebuilds() {
    init_tracing();
    let backend = Rc::new(MemoryCache::new());
    let include_loads = Rc::new(Cell::new(0));
    let loader = include_scenario_loader(Rc::clone(&include_loads));
    let mut host = host_with(loader, &["a", "b"], Rc::clone(&backend));

    host.invoke_all("example", &[]).unwrap();
    host.flush();
    assert!(backend.contains(IMPLEMENTATIONS_CACHE_KEY));
    assert!(backend.contains(HOOK_INFO_CACHE_KEY));

    host.reset_caches();
    assert!(!backend.contains(IMPLEMENTATIONS_CACHE_KEY));
    assert!(!backend.contains(HOOK_INFO_CACHE_KEY));

    // Rebuild works from live state; includes stay memoized per context.
    let merged = host.invoke_all("example", &[]).unwrap();
    assert_eq!(merged.items, vec![json!("from a"), json!("from b")]);
    assert_eq!(include_loads.get(), 1);
}
