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

//! Registry of analysis descriptors
//!
//! Descriptors are registered once, up front, and looked up by the names they
//! produce. Registration only records metadata. The registry is frozen by
//! moving it into a [`Scheduler`](crate::scheduler::Scheduler).

use crate::context::FillContext;
use crate::descriptor::{AnalysisDescriptor, Target, TargetKind};
use crate::domain::{Domain, Fact};
use crate::error::{FactError, FactResult};
use crate::graph::DependencyGraph;
use crate::handle::{DomainHandle, RelationHandle};
use crate::relation::Relation;
use crate::resolver::Resolver;
use crate::signature::Signature;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Registry {
    descriptors: Vec<Arc<AnalysisDescriptor>>,
    /// Produced name -> index of its producer
    producers: HashMap<String, usize>,
    /// Descriptor name -> index
    names: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor.
    ///
    /// Fails with [`FactError::DuplicateName`] if its name, or any name it
    /// produces, is already taken by another descriptor.
    pub fn register(&mut self, descriptor: AnalysisDescriptor) -> FactResult<()> {
        if let Some(&existing) = self.names.get(descriptor.name()) {
            return Err(FactError::DuplicateName {
                name: descriptor.name().to_string(),
                existing: self.descriptors[existing].name().to_string(),
            });
        }
        for output in descriptor.outputs() {
            if let Some(&existing) = self.producers.get(output) {
                return Err(FactError::DuplicateName {
                    name: output.to_string(),
                    existing: self.descriptors[existing].name().to_string(),
                });
            }
        }

        let index = self.descriptors.len();
        debug!(descriptor = descriptor.name(), index, "Registering analysis");
        self.names.insert(descriptor.name().to_string(), index);
        for output in descriptor.outputs() {
            self.producers.insert(output.to_string(), index);
        }
        self.descriptors.push(Arc::new(descriptor));
        Ok(())
    }

    /// Register a descriptor that produces a single domain of facts `F`.
    ///
    /// The descriptor is named after the domain. `fill` receives the empty
    /// domain to populate.
    pub fn register_domain<F, Fill, I, S>(&mut self, name: &str, consumes: I, fill: Fill) -> FactResult<DomainHandle<F>>
    where
        F: Fact,
        Fill: Fn(&mut FillContext<'_>, &Domain<F>) -> anyhow::Result<()> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handle = DomainHandle::<F>::new(name);
        let output = handle.clone();
        let descriptor = AnalysisDescriptor::builder(name)
            .produces_domain::<F>(name)
            .consumes_all(consumes)
            .fill(move |ctx: &mut FillContext<'_>| {
                let domain = ctx.output_domain(&output)?;
                fill(ctx, &*domain)
            })
            .build()?;
        self.register(descriptor)?;
        Ok(handle)
    }

    /// Register a descriptor that produces a single relation.
    ///
    /// The descriptor is named after the relation. `fill` receives the empty
    /// relation, already bound to the domains of `signature`.
    pub fn register_relation<Fill, I, S>(&mut self, name: &str, signature: Signature, consumes: I, fill: Fill) -> FactResult<RelationHandle>
    where
        Fill: Fn(&FillContext<'_>, &mut Relation) -> anyhow::Result<()> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handle = RelationHandle::new(name);
        let output = name.to_string();
        let descriptor = AnalysisDescriptor::builder(name)
            .produces_relation(name, signature)
            .consumes_all(consumes)
            .fill(move |ctx: &mut FillContext<'_>| {
                let mut relation = ctx.take_relation(&output)?;
                let result = fill(&*ctx, &mut relation);
                ctx.restore_relation(relation);
                result
            })
            .build()?;
        self.register(descriptor)?;
        Ok(handle)
    }

    /// Producer of a domain or relation name
    pub fn lookup(&self, name: &str) -> FactResult<&Arc<AnalysisDescriptor>> {
        self.producer_index(name).map(|index| &self.descriptors[index]).ok_or_else(|| FactError::UnknownTarget {
            name: name.to_string(),
            requested_by: None,
        })
    }

    /// Descriptor by its own name
    pub fn descriptor_named(&self, name: &str) -> Option<&Arc<AnalysisDescriptor>> {
        self.names.get(name).map(|&index| &self.descriptors[index])
    }

    /// Registration index of the producer of `name`
    pub fn producer_index(&self, name: &str) -> Option<usize> {
        self.producers.get(name).copied()
    }

    /// Registration index of the descriptor called `name`
    pub fn descriptor_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub(crate) fn descriptor(&self, index: usize) -> &Arc<AnalysisDescriptor> {
        &self.descriptors[index]
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> &[Arc<AnalysisDescriptor>] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn target(&self, name: &str) -> FactResult<&Target> {
        let descriptor = self.lookup(name)?;
        descriptor.target(name).ok_or_else(|| FactError::UnknownTarget {
            name: name.to_string(),
            requested_by: None,
        })
    }

    /// Typed handle to a registered domain; checks the fact type
    pub fn domain_handle<F: Fact>(&self, name: &str) -> FactResult<DomainHandle<F>> {
        let target = self.target(name)?;
        if !target.is_domain_of::<F>() {
            return Err(FactError::type_mismatch(name, format!("domain of {}", std::any::type_name::<F>())));
        }
        Ok(DomainHandle::new(name))
    }

    /// Handle to a registered relation
    pub fn relation_handle(&self, name: &str) -> FactResult<RelationHandle> {
        match self.target(name)?.kind() {
            TargetKind::Relation { .. } => Ok(RelationHandle::new(name)),
            TargetKind::Domain { .. } => Err(FactError::type_mismatch(name, "relation")),
        }
    }

    /// Graph of producer/consumer edges between descriptors.
    ///
    /// Consumed names without a producer contribute no edge.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for descriptor in &self.descriptors {
            graph.add_descriptor(descriptor.name());
            for name in descriptor.consumes() {
                if let Some(index) = self.producer_index(name) {
                    graph.add_dependency(descriptor.name(), self.descriptors[index].name());
                }
            }
        }
        graph
    }

    /// Check the whole registry: every consumed name has a producer and no
    /// descriptor depends on itself, directly or transitively.
    pub fn validate(&self) -> FactResult<()> {
        for descriptor in &self.descriptors {
            for name in descriptor.consumes() {
                if self.producer_index(name).is_none() {
                    return Err(FactError::UnknownTarget {
                        name: name.clone(),
                        requested_by: Some(descriptor.name().to_string()),
                    });
                }
            }
        }

        if let Err(on_cycle) = self.dependency_graph().topological_sort() {
            // Walk from the offending descriptor to name the whole path
            let start = self.descriptor_named(&on_cycle).and_then(|descriptor| descriptor.outputs().next()).unwrap_or(on_cycle.as_str());
            Resolver::new(self).order_for(start, |_| false)?;
            return Err(FactError::CyclicDependency { cycle: vec![on_cycle] });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_produced_name() {
        let mut registry = Registry::new();
        registry.register_domain::<String, _, _, &str>("T", [], |_, _| Ok(())).unwrap();
        let again = AnalysisDescriptor::builder("types2").produces_domain::<String>("T").build().unwrap();
        match registry.register(again) {
            Err(FactError::DuplicateName { name, existing }) => {
                assert_eq!(name, "T");
                assert_eq!(existing, "T");
            }
            other => panic!("expected DuplicateName, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_and_handles() {
        let mut registry = Registry::new();
        let types = registry.register_domain::<String, _, _, &str>("T", [], |_, _| Ok(())).unwrap();
        let rel = registry.register_relation("excludeType", Signature::unary("T"), ["T"], |_, _| Ok(())).unwrap();

        assert_eq!(registry.lookup("excludeType").unwrap().name(), "excludeType");
        assert!(matches!(registry.lookup("missing"), Err(FactError::UnknownTarget { .. })));
        assert_eq!(registry.domain_handle::<String>("T").unwrap(), types);
        assert_eq!(registry.relation_handle("excludeType").unwrap(), rel);
        assert!(matches!(registry.domain_handle::<u64>("T"), Err(FactError::TypeMismatch { .. })));
        assert!(matches!(registry.relation_handle("T"), Err(FactError::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate_reports_missing_producer() {
        let mut registry = Registry::new();
        registry.register_relation("excludeType", Signature::unary("T"), Vec::<String>::new(), |_, _| Ok(())).unwrap();
        assert!(matches!(registry.validate(), Err(FactError::UnknownTarget { .. })));
    }

    #[test]
    fn test_validate_reports_cycle_path() {
        let mut registry = Registry::new();
        registry.register_domain::<String, _, _, _>("A", ["B"], |_, _| Ok(())).unwrap();
        registry.register_domain::<String, _, _, _>("B", ["A"], |_, _| Ok(())).unwrap();
        match registry.validate() {
            Err(FactError::CyclicDependency { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 3);
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_dependency_graph_edges() {
        let mut registry = Registry::new();
        registry.register_domain::<String, _, _, &str>("T", [], |_, _| Ok(())).unwrap();
        registry.register_relation("excludeType", Signature::unary("T"), Vec::<String>::new(), |_, _| Ok(())).unwrap();
        let graph = registry.dependency_graph();
        assert_eq!(graph.get_dependents("T"), vec!["excludeType".to_string()]);
        assert!(registry.validate().is_ok());
    }
}
