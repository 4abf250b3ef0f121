//! Hook discovery, caching, and dispatch for Extension Host.
//!
//! This crate provides the dispatch layer on top of `host-registry`:
//!
//! - **Implementation cache**: a two-tier (in-process + persistent) record of
//!   which extensions implement which hooks, verified lazily and self-healed
//!   when persisted state drifts from reality
//! - **Hook metadata**: per-hook include-group declarations, discovered
//!   through a hook and persisted
//! - **Dispatch**: single and aggregated invocation with deep-merged
//!   results, and the alter protocol for in-place mutation
//! - **Context facade**: [`HostContext`] wires registry, handler table, and
//!   cache backend together with explicit construction and teardown
//!
//! # Architecture
//!
//! ```text
//!               host application
//!                      |
//!                 host-dispatch
//!                      |
//!            +---------+---------+
//!            |                   |
//!      host-registry        host-cache
//! ```
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use host_cache::MemoryCache;
//! use host_dispatch::HostContext;
//! use host_registry::{ExtensionKind, ExtensionRegistry, HookResult, MemoryLoader};
//! use serde_json::{Value, json};
//!
//! let mut loader = MemoryLoader::new();
//! loader.add_primary("greeter", |table| {
//!     table.register_hook("greeter", "greeting", |_args: &[Value]| -> HookResult {
//!         Ok(Some(json!({"greeter": "hello"})))
//!     });
//! });
//!
//! let mut registry = ExtensionRegistry::new(Box::new(loader));
//! registry.add(ExtensionKind::Module, "greeter", "exts/greeter");
//!
//! let mut host = HostContext::new(registry, Rc::new(MemoryCache::new()));
//! host.bootstrap()?;
//!
//! let merged = host.invoke_all("greeting", &[])?;
//! assert_eq!(merged.map.get("greeter"), Some(&json!("hello")));
//! host.flush();
//! # Ok::<(), host_dispatch::Error>(())
//! ```

pub mod context;
pub mod error;
pub mod hook_info;
pub mod implementations;
pub mod merge;

pub use context::{
    HOOK_INFO_CACHE_KEY, HostContext, IMPLEMENTATIONS_ALTER_HOOK, IMPLEMENTATIONS_ALTER_TYPE,
    IMPLEMENTATIONS_CACHE_KEY,
};
pub use error::{Error, Result};
pub use hook_info::{HOOK_INFO_HOOK, HookInfo, HookInfoTable};
pub use implementations::{HookRecord, ImplementationCache, IncludeGroup};
pub use merge::{MergedResult, deep_merge};
