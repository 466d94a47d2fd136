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

//! Dependency resolution
//!
//! Turns a requested target into the list of descriptors that must run, in an
//! order where every descriptor comes after the producers of what it consumes.

use crate::descriptor::AnalysisDescriptor;
use crate::error::{FactError, FactResult};
use crate::registry::Registry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Visited,
}

/// Resolves execution orders against a registry
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Descriptors to run, in order, so that `target` becomes available.
    ///
    /// `is_done` reports whether a target name is already materialized.
    /// Descriptors whose outputs are all done are neither returned nor
    /// traversed. Dependencies are visited in registration order, so the
    /// result is reproducible, but it is a post-order: independent
    /// descriptors come out in visiting order, not registration order (for
    /// `D(B, C)` with `C(A)`, `B` precedes `A`).
    pub fn order_for<D>(&self, target: &str, is_done: D) -> FactResult<Vec<Arc<AnalysisDescriptor>>>
    where
        D: Fn(&str) -> bool,
    {
        let root = self.registry.producer_index(target).ok_or_else(|| FactError::UnknownTarget {
            name: target.to_string(),
            requested_by: None,
        })?;

        let mut walk = Walk {
            registry: self.registry,
            is_done: &is_done,
            marks: HashMap::new(),
            stack: Vec::new(),
            order: Vec::new(),
        };
        if !walk.descriptor_done(root) {
            walk.visit(root)?;
        }
        Ok(walk.order.into_iter().map(|index| Arc::clone(self.registry.descriptor(index))).collect())
    }

    /// Group a resolved order into batches.
    ///
    /// Every member of a batch only depends on descriptors in earlier batches
    /// (or on ones outside `order`, which are already done), so members of one
    /// batch may run concurrently. Each batch is in registration order.
    pub fn batches(&self, order: &[Arc<AnalysisDescriptor>]) -> FactResult<Vec<Vec<Arc<AnalysisDescriptor>>>> {
        let names: HashSet<&str> = order.iter().map(|descriptor| descriptor.name()).collect();
        let dependencies: HashMap<&str, Vec<&str>> = order
            .iter()
            .map(|descriptor| {
                let deps = self
                    .dependency_indices(descriptor)
                    .into_iter()
                    .map(|index| self.registry.descriptor(index).name())
                    .filter(|name| names.contains(name))
                    .collect();
                (descriptor.name(), deps)
            })
            .collect();

        let mut batches: Vec<Vec<Arc<AnalysisDescriptor>>> = Vec::new();
        let mut processed: HashSet<&str> = HashSet::new();

        while processed.len() < order.len() {
            let mut current: Vec<&Arc<AnalysisDescriptor>> = order
                .iter()
                .filter(|descriptor| !processed.contains(descriptor.name()))
                .filter(|descriptor| dependencies[descriptor.name()].iter().all(|dep| processed.contains(dep)))
                .collect();

            if current.is_empty() {
                let stuck: Vec<String> = order.iter().filter(|d| !processed.contains(d.name())).map(|d| d.name().to_string()).collect();
                return Err(FactError::CyclicDependency { cycle: stuck });
            }

            current.sort_by_key(|descriptor| self.registry.descriptor_index(descriptor.name()));
            processed.extend(current.iter().map(|descriptor| descriptor.name()));
            batches.push(current.into_iter().cloned().collect());
        }

        Ok(batches)
    }

    /// Producers of everything `descriptor` consumes, by registration index
    fn dependency_indices(&self, descriptor: &AnalysisDescriptor) -> Vec<usize> {
        let mut indices: Vec<usize> = descriptor.consumes().iter().filter_map(|name| self.registry.producer_index(name)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

struct Walk<'a, D> {
    registry: &'a Registry,
    is_done: &'a D,
    marks: HashMap<usize, Mark>,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl<D> Walk<'_, D>
where
    D: Fn(&str) -> bool,
{
    fn descriptor_done(&self, index: usize) -> bool {
        self.registry.descriptor(index).outputs().all(|output| (self.is_done)(output))
    }

    fn visit(&mut self, index: usize) -> FactResult<()> {
        match self.marks.get(&index) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::OnStack) => return Err(self.cycle_through(index)),
            None => {}
        }

        self.marks.insert(index, Mark::OnStack);
        self.stack.push(index);

        let descriptor = Arc::clone(self.registry.descriptor(index));
        let mut dependencies = Vec::with_capacity(descriptor.consumes().len());
        for name in descriptor.consumes() {
            let producer = self.registry.producer_index(name).ok_or_else(|| FactError::UnknownTarget {
                name: name.clone(),
                requested_by: Some(descriptor.name().to_string()),
            })?;
            dependencies.push(producer);
        }
        dependencies.sort_unstable();
        dependencies.dedup();

        for dependency in dependencies {
            if !self.descriptor_done(dependency) {
                self.visit(dependency)?;
            }
        }

        self.stack.pop();
        self.marks.insert(index, Mark::Visited);
        self.order.push(index);
        Ok(())
    }

    fn cycle_through(&self, index: usize) -> FactError {
        let start = self.stack.iter().position(|&i| i == index).unwrap_or(0);
        let cycle = self.stack[start..]
            .iter()
            .chain(std::iter::once(&index))
            .map(|&i| self.registry.descriptor(i).name().to_string())
            .collect();
        FactError::CyclicDependency { cycle }
    }
}
