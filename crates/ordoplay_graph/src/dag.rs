// SPDX-License-Identifier: MIT OR Apache-2.0
//! Directed graph primitive used for dependency and task graphs.

use indexmap::IndexSet;
use std::collections::VecDeque;

/// Directed graph with vertex payloads and de-duplicated edges.
///
/// Vertices are addressed by their insertion index. Edge lists keep
/// insertion order, so every traversal is deterministic.
#[derive(Debug, Clone)]
pub struct DirectedGraph<V> {
    vertices: Vec<V>,
    successors: Vec<IndexSet<usize>>,
    predecessors: Vec<IndexSet<usize>>,
}

impl<V> DirectedGraph<V> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: V) -> usize {
        self.vertices.push(vertex);
        self.successors.push(IndexSet::new());
        self.predecessors.push(IndexSet::new());
        self.vertices.len() - 1
    }

    /// Add the edge `from -> to`.
    ///
    /// Returns `false` if the edge already exists or an index is invalid.
    pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
        if from >= self.len() || to >= self.len() {
            return false;
        }
        if !self.successors[from].insert(to) {
            return false;
        }
        self.predecessors[to].insert(from);
        true
    }

    /// Whether the edge `from -> to` exists
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.successors
            .get(from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Vertex payload
    pub fn vertex(&self, index: usize) -> Option<&V> {
        self.vertices.get(index)
    }

    /// Mutable vertex payload
    pub fn vertex_mut(&mut self, index: usize) -> Option<&mut V> {
        self.vertices.get_mut(index)
    }

    /// All vertex payloads, by index
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(IndexSet::len).sum()
    }

    /// All edges as `(from, to)` pairs
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| targets.iter().map(move |&to| (from, to)))
    }

    /// Direct successors of `index`
    pub fn successors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.successors.get(index).into_iter().flatten().copied()
    }

    /// Direct predecessors of `index`
    pub fn predecessors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.predecessors.get(index).into_iter().flatten().copied()
    }

    /// Number of incoming edges
    pub fn in_degree(&self, index: usize) -> usize {
        self.predecessors.get(index).map_or(0, IndexSet::len)
    }

    /// Number of outgoing edges
    pub fn out_degree(&self, index: usize) -> usize {
        self.successors.get(index).map_or(0, IndexSet::len)
    }

    /// Vertices without incoming edges
    pub fn sources(&self) -> Vec<usize> {
        (0..self.len()).filter(|&v| self.in_degree(v) == 0).collect()
    }

    /// Vertices without outgoing edges
    pub fn sinks(&self) -> Vec<usize> {
        (0..self.len()).filter(|&v| self.out_degree(v) == 0).collect()
    }

    /// Vertices in dependency order (Kahn's algorithm, ties by index)
    pub fn topological_order(&self) -> Result<Vec<usize>, CycleError> {
        let mut in_degree: Vec<usize> = (0..self.len()).map(|v| self.in_degree(v)).collect();
        let mut ready: VecDeque<usize> = (0..self.len()).filter(|&v| in_degree[v] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(vertex) = ready.pop_front() {
            order.push(vertex);
            for next in self.successors(vertex) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(CycleError)
        }
    }

    /// Whether the graph has no directed cycle
    pub fn is_acyclic(&self) -> bool {
        self.topological_order().is_ok()
    }

    /// Copy the structure, transforming every payload
    pub fn map<U>(&self, mut f: impl FnMut(usize, &V) -> U) -> DirectedGraph<U> {
        DirectedGraph {
            vertices: self
                .vertices
                .iter()
                .enumerate()
                .map(|(index, vertex)| f(index, vertex))
                .collect(),
            successors: self.successors.clone(),
            predecessors: self.predecessors.clone(),
        }
    }
}

impl<V> Default for DirectedGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;
