// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Dependency Graph
//!
//! Directed graph over declared entities. An edge runs from a dependent to its
//! dependency, so the dependency must be provisioned first.
//!
//! # Ordering
//!
//! ```text
//! Network ──▶ Subnet ──▶ Instance
//!    │                      ▲
//!    └──▶ SecurityGroup ────┘
//! ```
//!
//! [`ResourceGraph::topological_order`] is Kahn's algorithm with ties broken
//! by declaration order, so the same model always yields the same sequence.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::domain::ResourceKind;
use crate::errors::{TopologyError, TopologyResult};
use crate::topology::TopologyModel;

/// Node of the resource graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub kind: ResourceKind,
    /// Declaration position
    pub index: usize,
}

/// Dependency graph derived from a [`TopologyModel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGraph {
    nodes: Vec<GraphNode>,
    by_name: IndexMap<String, usize>,
    /// node → nodes it depends on, deduplicated, in reference order
    dependencies: Vec<Vec<usize>>,
    /// node → nodes depending on it, in declaration order
    dependents: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

impl ResourceGraph {
    /// Build the graph from every declared reference
    ///
    /// # Errors
    /// - `UnknownReference` / `KindMismatch` from the model's reference check
    pub fn build(model: &TopologyModel) -> TopologyResult<Self> {
        model.check_references()?;

        let nodes: Vec<GraphNode> = model
            .iter()
            .enumerate()
            .map(|(index, (name, resource))| GraphNode {
                name: name.to_string(),
                kind: resource.kind(),
                index,
            })
            .collect();

        let by_name: IndexMap<String, usize> = nodes
            .iter()
            .map(|node| (node.name.clone(), node.index))
            .collect();

        let mut dependencies = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        let mut edge_count = 0usize;

        for node in &nodes {
            let mut seen = IndexSet::new();
            for dep in model.dependencies_of(&node.name) {
                // check_references guarantees the target exists
                let Some(&target) = by_name.get(&dep.target) else {
                    continue;
                };
                if seen.insert(target) {
                    dependencies[node.index].push(target);
                    dependents[target].push(node.index);
                    edge_count += 1;
                }
            }
        }

        for list in &mut dependents {
            list.sort_unstable();
        }

        debug!(
            "Built resource graph with {} nodes and {} edges",
            nodes.len(),
            edge_count
        );

        Ok(Self {
            nodes,
            by_name,
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(Vec::len).sum()
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.by_name.get(name).map(|&i| &self.nodes[i])
    }

    /// Direct dependencies of `name`
    pub fn dependencies_of(&self, name: &str) -> Vec<&GraphNode> {
        self.by_name
            .get(name)
            .map(|&i| self.dependencies[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Direct dependents of `name`
    pub fn dependents_of(&self, name: &str) -> Vec<&GraphNode> {
        self.by_name
            .get(name)
            .map(|&i| self.dependents[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Every node that depends on `name`, directly or not, in declaration order
    pub fn transitive_dependents(&self, name: &str) -> Vec<&GraphNode> {
        let Some(&start) = self.by_name.get(name) else {
            return Vec::new();
        };

        let mut reached = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for &dependent in &self.dependents[current] {
                if dependent != start && reached.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }
        reached.into_iter().map(|i| &self.nodes[i]).collect()
    }

    /// Find a dependency cycle
    ///
    /// Depth-first traversal from each node in declaration order, tracking the
    /// current path. Returns the path from the first repeated node back to
    /// itself, e.g. `["a", "b", "a"]`, or `None` for an acyclic graph.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path = Vec::new();

        for root in 0..self.nodes.len() {
            if marks[root] == Mark::Unvisited {
                if let Some(cycle) = self.visit(root, &mut marks, &mut path) {
                    warn!("Dependency cycle detected: {}", cycle.join(" -> "));
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit(&self, node: usize, marks: &mut [Mark], path: &mut Vec<usize>) -> Option<Vec<String>> {
        marks[node] = Mark::OnPath;
        path.push(node);

        for &next in &self.dependencies[node] {
            match marks[next] {
                Mark::OnPath => {
                    let start = path.iter().position(|&p| p == next).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&i| self.nodes[i].name.clone())
                        .collect();
                    cycle.push(self.nodes[next].name.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit(next, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        None
    }

    /// Dependencies-first linear order
    ///
    /// Kahn's algorithm: repeatedly take the earliest-declared node whose
    /// dependencies have all been emitted.
    ///
    /// # Errors
    /// - `CycleDetected` when some nodes can never become ready
    pub fn topological_order(&self) -> TopologyResult<Vec<&GraphNode>> {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = ready.pop_first() {
            order.push(&self.nodes[next]);
            for &dependent in &self.dependents[next] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(self.cycle_error(&remaining));
        }
        Ok(order)
    }

    /// Waves of nodes whose dependencies all sit in earlier waves
    ///
    /// Concatenating the waves gives a valid topological order; nodes in one
    /// wave may be provisioned concurrently.
    pub fn levels(&self) -> TopologyResult<Vec<Vec<&GraphNode>>> {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut current: Vec<usize> = (0..self.nodes.len()).filter(|&i| remaining[i] == 0).collect();
        let mut levels = Vec::new();
        let mut placed = 0usize;

        while !current.is_empty() {
            let mut next = BTreeSet::new();
            for &node in &current {
                for &dependent in &self.dependents[node] {
                    remaining[dependent] -= 1;
                    if remaining[dependent] == 0 {
                        next.insert(dependent);
                    }
                }
            }
            placed += current.len();
            levels.push(current.iter().map(|&i| &self.nodes[i]).collect());
            current = next.into_iter().collect();
        }

        if placed != self.nodes.len() {
            return Err(self.cycle_error(&remaining));
        }
        Ok(levels)
    }

    fn cycle_error(&self, remaining: &[usize]) -> TopologyError {
        let path = self.detect_cycle().unwrap_or_else(|| {
            remaining
                .iter()
                .enumerate()
                .filter(|(_, &count)| count > 0)
                .map(|(i, _)| self.nodes[i].name.clone())
                .collect()
        });
        TopologyError::CycleDetected { path }
    }
}
