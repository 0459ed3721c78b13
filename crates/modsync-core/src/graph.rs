//! Dependency graph between synced modules.
//!
//! The walker records one edge per resolved declaration. Once the walk is
//! finished, [`DependencyGraph::topological_sort`] yields the modules in
//! dependency-first order for the report.
//!
//! # Example
//!
//! ```
//! use modsync_core::{DependencyGraph, ModuleId};
//!
//! let app = ModuleId::parse("saibo/App").unwrap();
//! let helper = ModuleId::parse("saibo/Helper").unwrap();
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node(app.clone());
//! graph.add_edge(&app, &helper);
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order, vec![helper, app]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::identifier::ModuleId;
use crate::{Error, Result};

/// Directed graph of module dependencies.
///
/// Edges point from dependent to dependency: if A depends on B, the edge is
/// `A -> B`. Ordered collections keep every traversal deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list: key depends on each value.
    edges: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module without dependencies. Existing edges are kept.
    pub fn add_node(&mut self, id: ModuleId) {
        self.edges.entry(id).or_default();
    }

    /// Declare that `from` depends on `to`, adding either node if missing.
    pub fn add_edge(&mut self, from: &ModuleId, to: &ModuleId) {
        self.edges.entry(to.clone()).or_default();
        self.edges.entry(from.clone()).or_default().insert(to.clone());
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.edges.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Direct dependencies of a module, sorted.
    pub fn dependencies_of(&self, id: &ModuleId) -> Vec<&ModuleId> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Kahn's algorithm, dependency-first.
    ///
    /// Among modules whose dependencies are all placed, the smallest
    /// `namespace/name` goes first, so equal graphs sort identically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] listing the modules left unplaced.
    pub fn topological_sort(&self) -> Result<Vec<ModuleId>> {
        let mut pending: BTreeMap<&ModuleId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&ModuleId, Vec<&ModuleId>> = BTreeMap::new();
        for (from, deps) in &self.edges {
            pending.insert(from, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(from);
            }
        }

        let mut ready: BTreeSet<&ModuleId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.edges.len());

        while let Some(current) = ready.pop_first() {
            order.push(current.clone());
            for dependent in dependents.get(current).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            let placed: BTreeSet<&ModuleId> = order.iter().collect();
            let cycle = self
                .edges
                .keys()
                .filter(|id| !placed.contains(id))
                .cloned()
                .collect();
            return Err(Error::CyclicDependency { cycle });
        }

        Ok(order)
    }
}
