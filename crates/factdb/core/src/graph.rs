// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Descriptor dependency graph.
//!
//! Whole-registry view of which analysis feeds which, used for up-front
//! validation and for finding the dependents of an invalidated target.

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::HashMap;

/// Directed graph over descriptor names; an edge runs from a dependency to its dependent
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor if not present
    pub fn add_descriptor(&mut self, name: &str) -> NodeIndex {
        if let Some(&node_index) = self.node_indices.get(name) {
            return node_index;
        }

        let node_index = self.graph.add_node(name.to_string());
        self.node_indices.insert(name.to_string(), node_index);
        node_index
    }

    /// Record that `dependent` consumes something `dependency` produces
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let dependent_index = self.add_descriptor(dependent);
        let dependency_index = self.add_descriptor(dependency);

        if !self.graph.contains_edge(dependency_index, dependent_index) {
            self.graph.add_edge(dependency_index, dependent_index, ());
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Execution order of every descriptor.
    ///
    /// On a cycle, returns the name of one descriptor that lies on it.
    pub fn topological_sort(&self) -> Result<Vec<String>, String> {
        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices.into_iter().map(|idx| self.graph[idx].clone()).collect()),
            Err(cycle) => Err(self.graph[cycle.node_id()].clone()),
        }
    }

    /// Direct dependencies of a descriptor
    pub fn get_dependencies(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Descriptors consuming an output of `name` directly
    pub fn get_dependents(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Every descriptor reachable downstream of `name`, excluding `name` itself
    pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
        let Some(&start) = self.node_indices.get(name) else {
            return Vec::new();
        };

        let mut bfs = Bfs::new(&self.graph, start);
        let mut dependents = Vec::new();
        while let Some(node) = bfs.next(&self.graph) {
            if node != start {
                dependents.push(self.graph[node].clone());
            }
        }
        dependents
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<String> {
        match self.node_indices.get(name) {
            Some(&node_index) => self.graph.neighbors_directed(node_index, direction).map(|idx| self.graph[idx].clone()).collect(),
            None => Vec::new(),
        }
    }
}
