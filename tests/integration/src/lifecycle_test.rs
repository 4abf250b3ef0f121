//! End-to-end lifecycle test: declarations on disk -> discovery ->
//! dependency resolution -> load -> dispatch.

use std::cell::Cell;
use std::rc::Rc;

use host_cache::MemoryCache;
use host_dispatch::HostContext;
use host_registry::{ExtensionRegistry, HookResult, MemoryLoader};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Write declaration files for extensions `a`, `b` (requires a), and `c`
/// (requires a and b), declared in reverse order on disk.
fn write_declarations() -> TempDir {
    let temp = TempDir::new().unwrap();
    let declarations = [
        ("a", ""),
        ("b", r#"dependencies = ["a"]"#),
        ("c", r#"dependencies = ["a (>=1.0)", "b"]"#),
    ];
    for (name, deps) in declarations {
        let dir = temp.path().join(name);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join("extension.toml"),
            format!("[extension]\nname = \"{name}\"\nversion = \"1.0.0\"\n{deps}\n"),
        )
        .unwrap();
    }
    temp
}

/// Loader where every extension contributes `{<name>: <load index>}` to the
/// "build_info" hook.
fn recording_loader(names: &[&str], load_order: Rc<std::cell::RefCell<Vec<String>>>) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for name in names {
        let name = name.to_string();
        let load_order = Rc::clone(&load_order);
        loader.add_primary(&name.clone(), move |table| {
            load_order.borrow_mut().push(name.clone());
            let name = name.clone();
            table.register_hook(&name.clone(), "build_info", move |_args: &[Value]| -> HookResult {
                Ok(Some(json!({ (name.clone()): true })))
            });
        });
    }
    loader
}

#[test]
fn test_discover_resolve_load_dispatch() {
    init_tracing();
    let temp = write_declarations();
    let load_order = Rc::new(std::cell::RefCell::new(Vec::new()));
    let loader = recording_loader(&["a", "b", "c"], Rc::clone(&load_order));

    let mut registry = ExtensionRegistry::new(Box::new(loader));
    // Declared in directory scan order; dependencies reorder below.
    let added = registry.discover(temp.path()).unwrap();
    assert_eq!(added, vec!["a", "b", "c"]);

    let mut host = HostContext::new(registry, Rc::new(MemoryCache::new()));
    host.bootstrap().unwrap();

    // Dependencies load before dependents.
    assert_eq!(*load_order.borrow(), vec!["a", "b", "c"]);

    // Derived dependency data is complete.
    let a = host.registry().get("a").unwrap().resolved.clone().unwrap();
    let c = host.registry().get("c").unwrap().resolved.clone().unwrap();
    assert_eq!(a.required_by.iter().collect::<Vec<_>>(), vec!["b", "c"]);
    assert_eq!(c.requires.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(a.weight < c.weight);

    // Dispatch visits implementers in load order.
    let merged = host.invoke_all("build_info", &[]).unwrap();
    assert_eq!(
        Value::Object(merged.map),
        json!({"a": true, "b": true, "c": true})
    );
    host.flush();
}

#[test]
fn test_invoke_all_merge_semantics() {
    init_tracing();
    let mut loader = MemoryLoader::new();
    loader.add_primary("first", |table| {
        table.register_hook("first", "settings", |_args: &[Value]| -> HookResult {
            Ok(Some(json!({"x": 1, "shared": {"from_first": true, "level": 1}})))
        });
    });
    loader.add_primary("second", |table| {
        table.register_hook("second", "settings", |_args: &[Value]| -> HookResult {
            Ok(Some(json!({"y": 2, "shared": {"from_second": true, "level": 2}})))
        });
    });

    let mut registry = ExtensionRegistry::new(Box::new(loader));
    registry.add(host_registry::ExtensionKind::Module, "first", "exts/first");
    registry.add(host_registry::ExtensionKind::Module, "second", "exts/second");
    let mut host = HostContext::new(registry, Rc::new(MemoryCache::new()));
    host.bootstrap().unwrap();

    let merged = host.invoke_all("settings", &[]).unwrap();
    // Disjoint keys survive; conflicting keys take the later value at each
    // nesting level; sibling keys under "shared" merge.
    assert_eq!(
        Value::Object(merged.map),
        json!({
            "x": 1,
            "y": 2,
            "shared": {"from_first": true, "from_second": true, "level": 2}
        })
    );
}

#[test]
fn test_repeated_queries_build_once() {
    init_tracing();
    let info_calls = Rc::new(Cell::new(0));
    let mut loader = MemoryLoader::new();
    {
        let info_calls = Rc::clone(&info_calls);
        loader.add_primary("a", move |table| {
            let info_calls = Rc::clone(&info_calls);
            table.register_hook("a", "hook_info", move |_args: &[Value]| -> HookResult {
                info_calls.set(info_calls.get() + 1);
                Ok(Some(json!({"token_list": {"group": "tokens"}})))
            });
            table.register_hook("a", "status", |_args: &[Value]| -> HookResult {
                Ok(Some(json!("ok")))
            });
        });
    }

    let mut registry = ExtensionRegistry::new(Box::new(loader));
    registry.add(host_registry::ExtensionKind::Module, "a", "exts/a");
    let mut host = HostContext::new(registry, Rc::new(MemoryCache::new()));
    host.bootstrap().unwrap();

    for _ in 0..5 {
        assert!(host.has_implementations("status", None).unwrap());
    }
    // Hook metadata was discovered during the single build pass.
    assert_eq!(info_calls.get(), 1);
}

#[test]
fn test_add_extension_is_picked_up_after_cache_reset() {
    init_tracing();
    let mut loader = MemoryLoader::new();
    loader.add_primary("a", |table| {
        table.register_hook("a", "status", |_args: &[Value]| -> HookResult {
            Ok(Some(json!("a ok")))
        });
    });
    loader.add_primary("late", |table| {
        table.register_hook("late", "status", |_args: &[Value]| -> HookResult {
            Ok(Some(json!("late ok")))
        });
    });

    let mut registry = ExtensionRegistry::new(Box::new(loader));
    registry.add(host_registry::ExtensionKind::Module, "a", "exts/a");
    let mut host = HostContext::new(registry, Rc::new(MemoryCache::new()));
    host.bootstrap().unwrap();

    assert_eq!(host.implementations("status").unwrap(), vec!["a"]);

    // Adding an extension invalidates discovery; loading it brings its
    // handlers in, and the next query rebuilds from live state.
    host.add_extension(host_registry::ExtensionKind::Module, "late", "exts/late");
    host.load_extension("late").unwrap();
    assert_eq!(host.implementations("status").unwrap(), vec!["a", "late"]);
}
