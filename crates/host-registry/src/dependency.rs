//! Dependency declarations and graph ordering for extensions.
//!
//! Each extension declares the names of extensions it requires, optionally
//! with a version constraint: `node`, `views (>=2.0)`. The graph computes,
//! for every registered extension, the transitive set it requires, the
//! transitive set that requires it, and a total-order weight so consumers can
//! load dependencies before dependents.
//!
//! Cycles are tolerated: resolution always terminates and produces the same
//! order for the same input, with co-cyclic nodes placed in declaration
//! order. Requirements on names that are not registered are recorded in the
//! `requires` sets but do not affect ordering.
//!
//! # Example
//!
//! ```
//! use host_registry::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("a");
//! graph.add_node("b");
//! graph.add_edge("b", "a");
//!
//! let resolved = graph.resolve();
//! assert!(resolved["a"].weight < resolved["b"].weight);
//! assert!(resolved["a"].required_by.contains("b"));
//! ```

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};
use crate::version::VersionConstraint;

/// A parsed dependency declaration.
///
/// Ephemeral: built while constructing the graph and discarded afterwards.
#[derive(Debug, Clone)]
pub struct DependencyEdge {
    /// Name of the required extension.
    pub name: String,
    /// Optional version constraint. Informational only; never consulted for
    /// ordering.
    pub constraint: Option<VersionConstraint>,
}

impl DependencyEdge {
    /// Parse a raw declaration of the form `name` or `name (CONSTRAINT)`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        let (name, constraint) = match trimmed.split_once('(') {
            Some((name, rest)) => {
                let inner = rest.trim().strip_suffix(')').ok_or_else(|| {
                    Error::InvalidDependency {
                        raw: raw.to_string(),
                        reason: "unterminated version constraint".to_string(),
                    }
                })?;
                (name.trim(), Some(VersionConstraint::parse(inner.trim())?))
            }
            None => (trimmed, None),
        };

        if name.is_empty() {
            return Err(Error::InvalidDependency {
                raw: raw.to_string(),
                reason: "missing extension name".to_string(),
            });
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidDependency {
                raw: raw.to_string(),
                reason: format!("invalid extension name '{name}'"),
            });
        }

        Ok(Self {
            name: name.to_string(),
            constraint,
        })
    }
}

/// Derived dependency data for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Transitive closure over outgoing requires-edges. May contain names
    /// that were never added as nodes.
    pub requires: BTreeSet<String>,
    /// Transitive closure over incoming requires-edges; known nodes only.
    pub required_by: BTreeSet<String>,
    /// Position in the dependency-first total order.
    pub weight: i64,
}

/// Directed graph of requires-edges between named nodes.
///
/// Nodes iterate in declaration order, which is also the tie-break order for
/// weights. The graph borrows nothing: callers feed it names and edges and
/// receive derived data back.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Direct requirements per node, in declaration order.
    nodes: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node is a no-op that keeps its edges.
    pub fn add_node(&mut self, name: impl Into<String>) {
        self.nodes.entry(name.into()).or_default();
    }

    /// Declare that `from` requires `to`.
    ///
    /// `from` is created if absent. `to` is not: requirements on unknown
    /// names stay recorded on the edge list but get no node of their own.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.nodes
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve the graph into per-node derived data.
    ///
    /// The output is keyed in declaration order. Weights form a total order
    /// in which every node with no unplaced known requirement sorts before
    /// nodes still waiting on one; ties break by declaration order. When a
    /// cycle leaves no node placeable, the first remaining node in
    /// declaration order is placed, so resolution terminates on any input
    /// and repeated calls yield identical results.
    pub fn resolve(&self) -> IndexMap<String, Resolution> {
        let mut requires: IndexMap<&str, BTreeSet<String>> = IndexMap::new();
        for name in self.nodes.keys() {
            requires.insert(name, self.reachable(name));
        }

        let mut required_by: IndexMap<&str, BTreeSet<String>> = IndexMap::new();
        for name in self.nodes.keys() {
            required_by.insert(name, BTreeSet::new());
        }
        for (name, closure) in &requires {
            for target in closure {
                if let Some(dependents) = required_by.get_mut(target.as_str()) {
                    dependents.insert((*name).to_string());
                }
            }
        }

        let weights = self.assign_weights();

        self.nodes
            .keys()
            .map(|name| {
                (
                    name.clone(),
                    Resolution {
                        requires: requires.shift_remove(name.as_str()).unwrap_or_default(),
                        required_by: required_by.shift_remove(name.as_str()).unwrap_or_default(),
                        weight: weights[name.as_str()],
                    },
                )
            })
            .collect()
    }

    /// Transitive closure over outgoing edges, cycle-safe.
    fn reachable(&self, start: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = match self.nodes.get(start) {
            Some(direct) => direct.iter().map(String::as_str).collect(),
            None => Vec::new(),
        };

        while let Some(current) = stack.pop() {
            if current == start || !seen.insert(current.to_string()) {
                continue;
            }
            if let Some(direct) = self.nodes.get(current) {
                stack.extend(direct.iter().map(String::as_str));
            }
        }

        seen
    }

    fn assign_weights(&self) -> IndexMap<&str, i64> {
        let mut remaining: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        let mut placed: IndexSet<&str> = IndexSet::new();
        let mut weights = IndexMap::new();

        while !remaining.is_empty() {
            let next = remaining.iter().position(|name| {
                self.nodes[*name]
                    .iter()
                    .filter(|dep| self.nodes.contains_key(dep.as_str()))
                    .all(|dep| placed.contains(dep.as_str()))
            });
            // No placeable node means a cycle; fall back to declaration order.
            let node = remaining.remove(next.unwrap_or(0));
            weights.insert(node, placed.len() as i64);
            placed.insert(node);
        }

        weights
    }
}
